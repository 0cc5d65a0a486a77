use bcn_dds::{ImageFormat, Mipmaps};

fn main() {
    let args: Vec<_> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: img2dds <input image> <output dds> [bc1|bc2|bc3|bc4|bc5]");
        return;
    }

    // Don't assume the image comes with an alpha channel.
    let image = image::open(&args[1]).unwrap().to_rgba8();

    let format = match args.get(3).map(|s| s.to_lowercase()).as_deref() {
        Some("bc2") => ImageFormat::BC2 {
            premultiplied_alpha: false,
        },
        Some("bc3") => ImageFormat::BC3 {
            premultiplied_alpha: false,
        },
        Some("bc4") => ImageFormat::BC4 { signed: false },
        Some("bc5") => ImageFormat::BC5 { signed: false },
        _ => ImageFormat::BC1,
    };

    let options = bcn_dds::EncodeOptions {
        mipmaps: Mipmaps::GeneratedAutomatic,
        ..Default::default()
    };

    let start = std::time::Instant::now();
    let dds = bcn_dds::dds_from_image(&image, format, &options).unwrap();
    println!("Compressed data in {:?}", start.elapsed());

    let mut writer = std::io::BufWriter::new(std::fs::File::create(&args[2]).unwrap());
    dds.write(&mut writer).unwrap();
}
