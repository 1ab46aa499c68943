//! Check encoder availability.

use framecast_common::config::{config_file_path, AppConfig};
use framecast_export::ffmpeg::command_exists;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("framecast System Check");
    println!("{}", "=".repeat(50));

    let ffmpeg = command_exists("ffmpeg");
    if ffmpeg {
        println!("[OK] ffmpeg found on PATH");
    } else {
        println!("[WARN] ffmpeg not found on PATH (only --raw exports will work)");
    }

    let config_path = config_file_path();
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[OK] Config: defaults (no file at {})", config_path.display());
    }

    match config.validate() {
        Ok(()) => println!("[OK] Configuration values are usable"),
        Err(e) => println!("[FAIL] {e}"),
    }

    if config.exports_dir.is_dir() {
        println!("[OK] Exports directory: {}", config.exports_dir.display());
    } else {
        println!(
            "[WARN] Exports directory does not exist: {}",
            config.exports_dir.display()
        );
    }

    println!();
    if ffmpeg {
        println!("framecast is ready to export.");
    } else {
        println!("Install ffmpeg to encode video files.");
    }

    Ok(())
}
