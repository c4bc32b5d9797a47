#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use clickcap_image as image;

#[doc(inline)]
pub use clickcap_imgproc as imgproc;

#[doc(inline)]
pub use clickcap_segment as segment;

#[doc(inline)]
pub use clickcap_caption as caption;

#[doc(inline)]
pub use clickcap_refine as refine;

#[doc(inline)]
pub use clickcap_pipeline as pipeline;
