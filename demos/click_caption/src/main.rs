use argh::FromArgs;
use std::path::PathBuf;

use clickcap::{
    caption::{BlipCaptioner, BlipConfig, ClipFilter, CropMode},
    image::functional as F,
    pipeline::{CaptionPipeline, InferenceOptions, PipelineConfig},
    refine::{Controls, RefinerConfig, Sentiment, TextRefiner},
    segment::{BoxPrompt, PromptPoint, SamSegmenterBuilder, SpatialPrompt},
};

#[derive(FromArgs)]
/// Segment a clicked region, caption it and refine the caption
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

    /// click points as "x,y[,fg|bg];..." in image coordinates
    #[argh(option, short = 'p', default = "String::new()")]
    points: String,

    /// box prompt as "x0,y0,x1,y1" in image coordinates
    #[argh(option)]
    bbox: Option<String>,

    /// word budget of the refined caption
    #[argh(option)]
    length: Option<usize>,

    /// sentiment of the refined caption: positive, natural, negative
    #[argh(option, default = "String::from(\"natural\")")]
    sentiment: String,

    /// language of the refined caption
    #[argh(option, default = "String::from(\"English\")")]
    language: String,

    /// let the refiner embellish beyond the caption
    #[argh(switch)]
    imagination: bool,

    /// crop mode for captioning: wo_bg or w_bg
    #[argh(option, default = "String::from(\"wo_bg\")")]
    crop_mode: String,

    /// filter captions with a low CLIP similarity to the crop
    #[argh(switch)]
    clip_filter: bool,

    /// similarity threshold of the clip filter
    #[argh(option, default = "0.2")]
    clip_threshold: f32,

    /// caption the whole image as extra context for the refiner
    #[argh(switch)]
    context_captions: bool,

    /// crop the tight mask box instead of the expanded regular box
    #[argh(switch)]
    disable_regular_box: bool,

    /// caption the region at reduced resolution
    #[argh(switch)]
    enable_reduce_tokens: bool,

    /// smooth the mask with a morphological open/close
    #[argh(switch)]
    enable_morphology: bool,

    /// skip caption refinement
    #[argh(switch)]
    disable_refine: bool,

    /// enrich refinement with a knowledge lookup
    #[argh(switch)]
    enable_wiki: bool,

    /// save the region crop next to the mask
    #[argh(switch)]
    save_crops: bool,

    /// directory mask and crop artifacts are written to
    #[argh(option, default = "PathBuf::from(\"result\")")]
    result_dir: PathBuf,

    /// number of threads for onnx inference
    #[argh(option, default = "4")]
    num_threads: usize,

    /// the maximum length of the generated caption
    #[argh(option, default = "60")]
    sample_length: usize,
}

fn parse_points(arg: &str) -> Result<Vec<PromptPoint>, String> {
    let mut points = Vec::new();
    for part in arg.split(';').filter(|p| !p.trim().is_empty()) {
        let fields: Vec<&str> = part.split(',').map(str::trim).collect();
        if fields.len() < 2 || fields.len() > 3 {
            return Err(format!("invalid point: {part:?}"));
        }
        let x: f32 = fields[0].parse().map_err(|_| format!("invalid x: {part:?}"))?;
        let y: f32 = fields[1].parse().map_err(|_| format!("invalid y: {part:?}"))?;
        let point = match fields.get(2).copied().unwrap_or("fg") {
            "fg" => PromptPoint::foreground(x, y),
            "bg" => PromptPoint::background(x, y),
            other => return Err(format!("invalid label: {other:?}")),
        };
        points.push(point);
    }
    Ok(points)
}

fn parse_box(arg: &str) -> Result<BoxPrompt, String> {
    let fields: Vec<f32> = arg
        .split(',')
        .map(|f| f.trim().parse().map_err(|_| format!("invalid box: {arg:?}")))
        .collect::<Result<_, _>>()?;
    if fields.len() != 4 {
        return Err(format!("invalid box: {arg:?}"));
    }
    Ok(BoxPrompt {
        x0: fields[0],
        y0: fields[1],
        x1: fields[2],
        y1: fields[3],
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    // ORT uses this env var internally
    if let Some(dylib_path) = &args.ort_dylib_path {
        std::env::set_var("ORT_DYLIB_PATH", dylib_path);
    }

    let prompt = SpatialPrompt {
        points: parse_points(&args.points)?,
        bbox: args.bbox.as_deref().map(parse_box).transpose()?,
        multimask: true,
    };
    if prompt.is_empty() {
        return Err("pass at least one --points click or a --bbox".into());
    }

    let controls = Controls {
        length: args.length,
        sentiment: match args.sentiment.as_str() {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            _ => Sentiment::Natural,
        },
        language: args.language.clone(),
        imagination: args.imagination,
    };

    let config = PipelineConfig {
        crop_mode: match args.crop_mode.as_str() {
            "w_bg" => CropMode::WithBackground,
            _ => CropMode::WithoutBackground,
        },
        regular_box: !args.disable_regular_box,
        enable_reduce_tokens: args.enable_reduce_tokens,
        enable_morphology: args.enable_morphology,
        context_captions: args.context_captions,
        save_crops: args.save_crops,
        result_dir: args.result_dir.clone(),
        ..Default::default()
    };

    // read the image
    let image = F::read_image_any_rgb8(&args.image_path)?;
    println!("image: {} ({})", args.image_path.display(), image.size());

    let segmenter = SamSegmenterBuilder::new(args.encoder.clone(), args.decoder.clone())
        .with_num_threads(args.num_threads)
        .build()?;

    let mut captioner = BlipCaptioner::new(BlipConfig {
        sample_len: args.sample_length,
        ..Default::default()
    })?;
    if args.clip_filter {
        captioner = captioner.with_clip_filter(ClipFilter::new(args.clip_threshold)?);
    }

    let refiner = if args.disable_refine {
        None
    } else {
        match std::env::var("OPENAI_API_KEY") {
            Ok(api_key) => Some(TextRefiner::new(api_key, RefinerConfig::default())?),
            Err(_) => {
                log::warn!("OPENAI_API_KEY is not set, captions stay raw");
                None
            }
        }
    };

    let mut pipeline = match refiner {
        Some(refiner) => CaptionPipeline::with_probed_refiner(segmenter, captioner, refiner, config),
        None => CaptionPipeline::<_, _, TextRefiner>::new(segmenter, captioner, None, config),
    };

    let out = pipeline.inference(
        &image,
        &prompt,
        &controls,
        &InferenceOptions {
            disable_refine: args.disable_refine,
            enable_wiki: args.enable_wiki,
        },
    )?;

    println!("raw caption:     {}", out.captions.raw);
    println!("refined caption: {}", out.captions.refined);
    if let Some(wiki) = &out.captions.wiki {
        println!("knowledge:       {wiki}");
    }
    for ctx in &out.context_captions {
        println!("context:         {ctx}");
    }
    println!("mask saved to:   {}", out.mask_path.display());
    if let Some(crop_path) = &out.crop_path {
        println!("crop saved to:   {}", crop_path.display());
    }

    Ok(())
}
