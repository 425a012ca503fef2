use std::path::PathBuf;

use dotmatrix_common::Color;
use dotmatrix_gb::{GameBoy, SCREEN_HEIGHT, SCREEN_WIDTH};

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let rom_path: PathBuf = args.next().map(PathBuf::from).unwrap_or_else(|| {
        eprintln!("Usage: frame_dump <rom_path> <out_rgb24_path> [frames]");
        std::process::exit(2);
    });
    let out_path: PathBuf = args.next().map(PathBuf::from).unwrap_or_else(|| {
        eprintln!("Usage: frame_dump <rom_path> <out_rgb24_path> [frames]");
        std::process::exit(2);
    });
    let frames: u32 = args
        .next()
        .unwrap_or_else(|| "120".to_string())
        .parse()
        .unwrap_or_else(|_| {
            eprintln!("Invalid frame count; expected an integer.");
            std::process::exit(2);
        });

    let rom = std::fs::read(&rom_path).unwrap_or_else(|err| {
        eprintln!("Failed to read ROM '{}': {err}", rom_path.display());
        std::process::exit(1);
    });

    let mut gb = GameBoy::new();
    if let Err(err) = gb.load_rom(&rom) {
        eprintln!("Failed to load ROM '{}': {err}", rom_path.display());
        std::process::exit(1);
    }

    for _ in 0..frames {
        gb.step_frame();
    }

    let mut buffer = vec![0u8; SCREEN_WIDTH * SCREEN_HEIGHT * 3];
    for (i, &shade) in gb.framebuffer().iter().enumerate() {
        let color = Color::DMG_SHADES[(shade & 0x03) as usize];
        buffer[i * 3] = color.r;
        buffer[i * 3 + 1] = color.g;
        buffer[i * 3 + 2] = color.b;
    }

    std::fs::write(&out_path, &buffer).unwrap_or_else(|err| {
        eprintln!("Failed to write '{}': {err}", out_path.display());
        std::process::exit(1);
    });

    println!(
        "Wrote {} bytes ({}x{} rgb24) after {} frames to '{}'",
        buffer.len(),
        SCREEN_WIDTH,
        SCREEN_HEIGHT,
        frames,
        out_path.display()
    );
}
