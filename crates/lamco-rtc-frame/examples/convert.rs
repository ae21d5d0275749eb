//! Feed synthetic camera frames through the conversion engine
//!
//! Simulates a 60 fps 420f camera gated down to 30 fps and scaled to 640x360,
//! then prints the resulting statistics.
//!
//! Run with: `cargo run -p lamco-rtc-frame --example convert`

use std::time::Duration;

use lamco_rtc_frame::{
    AdaptationMode, ConverterConfig, FrameConverter, PixelFormat, ResourceMonitor, TransportFrame, FOURCC_420F,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let config = ConverterConfig::builder()
        .target_resolution(640, 360)
        .target_fps(30)
        .sweep_interval(Duration::from_millis(250))
        .build();
    let converter = FrameConverter::new(config)?;
    let monitor = ResourceMonitor::start(&converter);

    let (width, height) = (1280, 720);
    let size = PixelFormat::FullRangeYuv420
        .buffer_size(width, height)
        .ok_or("unsupported format")?;

    for i in 0..120u64 {
        let pts = Duration::from_micros(i * 16_667);
        let luma = (i % 256) as u8;
        converter.on_frame(TransportFrame::new(FOURCC_420F, width, height, vec![luma; size], pts));

        if i == 60 {
            converter.set_adaptation_mode(AdaptationMode::Performance);
        }
        tokio::task::yield_now().await;
    }

    let latest = converter.latest_frame(None)?;
    println!(
        "latest: #{} {} {}x{} pts={:?}",
        latest.sequence(),
        latest.format(),
        latest.dimensions().0,
        latest.dimensions().1,
        latest.pts()
    );

    let snapshot = converter.latest_frame_bgra()?;
    println!("snapshot: {} bytes", snapshot.data.len());

    let stats = converter.stats();
    println!(
        "frames={} processed={} dropped={} fps={:.1} outstanding={} mode={}",
        stats.frame_count,
        stats.processed_count,
        stats.dropped_frame_count,
        stats.estimated_fps,
        stats.outstanding_buffers,
        stats.processing_mode
    );

    monitor.stop().await;
    Ok(())
}
