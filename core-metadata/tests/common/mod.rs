//! Synthesized audio containers for codec tests.
//!
//! Each builder produces the smallest file lofty accepts for that container,
//! with no tags and no real audio.

#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};

/// `fLaC` + STREAMINFO (44.1 kHz, stereo, 16 bit, 3 s) + PADDING.
pub fn flac_bytes() -> Vec<u8> {
    let mut out = b"fLaC".to_vec();

    // STREAMINFO, not last
    out.push(0x00);
    out.extend_from_slice(&34u32.to_be_bytes()[1..]);
    out.extend_from_slice(&4096u16.to_be_bytes());
    out.extend_from_slice(&4096u16.to_be_bytes());
    out.extend_from_slice(&[0, 0, 0]);
    out.extend_from_slice(&[0, 0, 0]);
    let packed: u64 = (44_100u64 << 44) | (1u64 << 41) | (15u64 << 36) | 132_300u64;
    out.extend_from_slice(&packed.to_be_bytes());
    out.extend_from_slice(&[0u8; 16]);

    // PADDING, last
    out.push(0x80 | 0x01);
    out.extend_from_slice(&64u32.to_be_bytes()[1..]);
    out.extend_from_slice(&[0u8; 64]);

    out.extend_from_slice(&[0u8; 16]);
    out
}

/// 100 MPEG-1 Layer III frames at 128 kbps, 44.1 kHz.
pub fn mp3_bytes() -> Vec<u8> {
    const FRAME_LEN: usize = 417;
    let mut out = Vec::with_capacity(FRAME_LEN * 100);
    for _ in 0..100 {
        let mut frame = vec![0u8; FRAME_LEN];
        frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0x64]);
        out.extend_from_slice(&frame);
    }
    out
}

fn atom(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);
    out
}

/// `ftyp` + `moov(mvhd)` + `mdat`.
pub fn mp4_bytes() -> Vec<u8> {
    let mut ftyp = b"M4A ".to_vec();
    ftyp.extend_from_slice(&0u32.to_be_bytes());
    ftyp.extend_from_slice(b"M4A mp42isom");

    let mut mvhd = vec![0u8; 4]; // version + flags
    mvhd.extend_from_slice(&0u32.to_be_bytes()); // creation
    mvhd.extend_from_slice(&0u32.to_be_bytes()); // modification
    mvhd.extend_from_slice(&1000u32.to_be_bytes()); // timescale
    mvhd.extend_from_slice(&3000u32.to_be_bytes()); // duration
    mvhd.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // rate
    mvhd.extend_from_slice(&0x0100u16.to_be_bytes()); // volume
    mvhd.extend_from_slice(&[0u8; 10]);
    for value in [0x0001_0000u32, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000] {
        mvhd.extend_from_slice(&value.to_be_bytes());
    }
    mvhd.extend_from_slice(&[0u8; 24]);
    mvhd.extend_from_slice(&2u32.to_be_bytes()); // next track id

    let mut out = atom(b"ftyp", &ftyp);
    out.extend(atom(b"moov", &atom(b"mvhd", &mvhd)));
    out.extend(atom(b"mdat", &[0u8; 16]));
    out
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([30, 120, 200]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).expect("write fixture");
    path
}
