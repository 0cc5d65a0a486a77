fn main() {
    let args: Vec<_> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: dds2img <input dds> <output image>");
        return;
    }

    let reader = std::io::BufReader::new(std::fs::File::open(&args[1]).unwrap());

    let start = std::time::Instant::now();
    let (header, surface) =
        bcn_dds::decode_dds_stream(reader, &bcn_dds::DecodeOptions::default()).unwrap();
    println!(
        "Decompressed {} of {} mipmaps in {:?}",
        surface.mipmaps,
        header.mipmap_count(),
        start.elapsed()
    );

    let image = surface.to_image(0).unwrap();
    image.save(&args[2]).unwrap();
}
