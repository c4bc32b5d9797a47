use argh::FromArgs;
use std::path::PathBuf;

use clickcap_image::functional as F;
use clickcap_image::png::{write_image_png_gray8, write_image_png_rgb8};
use clickcap_imgproc::mask::apply_mask;
use clickcap_imgproc::morphology::{self, Kernel, KernelShape};
use clickcap_segment::{PromptPoint, SamSegmenterBuilder, SpatialPrompt};

#[derive(FromArgs)]
/// Segment a clicked region and save the cleaned mask and masked image
struct Args {
    /// path to an input image
    #[argh(option, short = 'i')]
    image_path: PathBuf,

    /// path to the SAM encoder onnx model
    #[argh(option)]
    encoder: PathBuf,

    /// path to the SAM decoder onnx model
    #[argh(option)]
    decoder: PathBuf,

    /// path to the onnxruntime dynamic library
    #[argh(option)]
    ort_dylib_path: Option<PathBuf>,

    /// foreground click points as "x,y;..." in image coordinates
    #[argh(option, short = 'p')]
    points: String,

    /// kernel size of the morphological cleanup (default: 6)
    #[argh(option, short = 's', default = "6")]
    kernel_size: usize,

    /// directory the outputs are written to
    #[argh(option, default = "PathBuf::from(\"result\")")]
    output_dir: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    if let Some(dylib_path) = &args.ort_dylib_path {
        std::env::set_var("ORT_DYLIB_PATH", dylib_path);
    }

    // read the image
    let image = F::read_image_any_rgb8(&args.image_path)?;

    // parse the foreground clicks
    let mut points = Vec::new();
    for part in args.points.split(';').filter(|p| !p.trim().is_empty()) {
        let fields: Vec<&str> = part.split(',').map(str::trim).collect();
        if fields.len() != 2 {
            return Err(format!("invalid point: {part:?}").into());
        }
        points.push(PromptPoint::foreground(
            fields[0].parse()?,
            fields[1].parse()?,
        ));
    }
    let prompt = SpatialPrompt::from_points(points);

    // segment
    let mut segmenter = SamSegmenterBuilder::new(args.encoder, args.decoder).build()?;
    segmenter.set_image(&image)?;
    let candidates = segmenter.segment(&prompt)?;
    let best = candidates.first().ok_or("no mask candidate")?;
    println!("best mask score: {:.3}", best.score);

    // clean the mask with an open followed by a close
    let kernel = Kernel::new(KernelShape::Box {
        size: args.kernel_size,
    });
    let mut opened = clickcap_image::Image::from_size_val(best.mask.size(), 0u8)?;
    morphology::open(&best.mask, &mut opened, &kernel)?;
    let mut cleaned = clickcap_image::Image::from_size_val(best.mask.size(), 0u8)?;
    morphology::close(&opened, &mut cleaned, &kernel)?;

    std::fs::create_dir_all(&args.output_dir)?;

    let mask_path = args.output_dir.join("mask.png");
    write_image_png_gray8(&mask_path, &cleaned)?;
    println!("mask saved to {}", mask_path.display());

    let masked = apply_mask(&image, &cleaned, [0, 0, 0])?;
    let masked_path = args.output_dir.join("masked.png");
    write_image_png_rgb8(&masked_path, &masked)?;
    println!("masked image saved to {}", masked_path.display());

    Ok(())
}
