//! Example of logging a toy training loop with livelog.

use livelog::{ImageValue, Live, LiveConfig, PlotOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Start a session; previous artifacts under ./dvclive are purged.
    let mut live = Live::new(LiveConfig::new())?;
    println!("Logging to {}", live.dir().display());

    // 2. Simulate training
    for epoch in 0..20u64 {
        let t = epoch as f64 * 0.2;
        live.log("train/loss", (-t).exp())?;
        live.log("train/acc", 1.0 - 0.5 * (-t).exp())?;
        live.log("epoch", epoch as i64)?;

        // A tiny gradient image per epoch
        let shade = (epoch * 12) as u8;
        let pixels: Vec<u8> = (0..16u8).flat_map(|i| [shade, i * 16, 255 - shade]).collect();
        live.log_image("gradient.png", ImageValue::pixels(4, 4, 3, pixels))?;

        live.next_step()?;
    }

    // 3. Evaluation plots
    let labels = vec![0.0, 0.0, 1.0, 1.0, 1.0, 0.0];
    let scores = vec![0.1, 0.4, 0.35, 0.8, 0.9, 0.2];
    live.log_plot("roc", labels.clone(), scores.clone(), PlotOptions::default())?;
    live.log_plot("precision_recall", labels, scores, PlotOptions::default())?;
    live.log_plot(
        "confusion_matrix",
        vec!["cat", "dog", "dog"],
        vec!["cat", "cat", "dog"],
        PlotOptions::default(),
    )?;

    println!("Summary: {}", live.read_latest()?);
    println!("Report:  {}", live.html_path().display());
    Ok(())
}
