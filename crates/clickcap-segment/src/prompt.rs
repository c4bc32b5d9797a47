use clickcap_image::ImageSize;
use serde::{Deserialize, Serialize};

use crate::error::SegmentError;
use crate::preprocess::transform_coords;

/// Label of a prompt point: part of the object or part of the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointLabel {
    /// The point lies on the object to segment.
    Foreground,
    /// The point lies on background to exclude.
    Background,
}

impl PointLabel {
    /// The label value the SAM decoder expects.
    pub fn to_f32(self) -> f32 {
        match self {
            PointLabel::Foreground => 1.0,
            PointLabel::Background => 0.0,
        }
    }
}

/// A click point in original image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PromptPoint {
    /// X coordinate in pixels.
    pub x: f32,
    /// Y coordinate in pixels.
    pub y: f32,
    /// Foreground or background.
    pub label: PointLabel,
}

impl PromptPoint {
    /// A foreground click.
    pub fn foreground(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            label: PointLabel::Foreground,
        }
    }

    /// A background click.
    pub fn background(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            label: PointLabel::Background,
        }
    }
}

/// A box prompt in original image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxPrompt {
    /// X coordinate of the top-left corner.
    pub x0: f32,
    /// Y coordinate of the top-left corner.
    pub y0: f32,
    /// X coordinate of the bottom-right corner.
    pub x1: f32,
    /// Y coordinate of the bottom-right corner.
    pub y1: f32,
}

/// A geometric description of what the user wants segmented: click points
/// with foreground/background labels and/or one box.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpatialPrompt {
    /// Click points in original image coordinates.
    #[serde(default)]
    pub points: Vec<PromptPoint>,
    /// Optional box in original image coordinates.
    #[serde(default)]
    pub bbox: Option<BoxPrompt>,
    /// Whether the decoder should return all mask candidates.
    #[serde(default)]
    pub multimask: bool,
}

impl SpatialPrompt {
    /// A prompt made of click points only.
    pub fn from_points(points: Vec<PromptPoint>) -> Self {
        Self {
            points,
            bbox: None,
            multimask: true,
        }
    }

    /// A prompt made of a single box.
    pub fn from_box(bbox: BoxPrompt) -> Self {
        Self {
            points: Vec::new(),
            bbox: Some(bbox),
            multimask: false,
        }
    }

    /// Whether the prompt carries neither points nor a box.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.bbox.is_none()
    }

    /// Encode the prompt into SAM decoder inputs.
    ///
    /// Point coordinates are mapped from original image space into the
    /// encoder input space. A box becomes its two corners with labels 2
    /// and 3; when no box is present a `(0, 0, -1)` padding point is
    /// appended, per the decoder contract.
    ///
    /// Returns the flat `[n, 2]` coordinates and the `[n]` labels.
    pub fn encode(
        &self,
        original_size: ImageSize,
        input_size: ImageSize,
    ) -> Result<(Vec<f32>, Vec<f32>), SegmentError> {
        if self.is_empty() {
            return Err(SegmentError::EmptyPrompt);
        }

        let mut coords = Vec::with_capacity((self.points.len() + 2) * 2);
        let mut labels = Vec::with_capacity(self.points.len() + 2);

        for point in &self.points {
            let (x, y) = transform_coords(point.x, point.y, original_size, input_size);
            coords.extend_from_slice(&[x, y]);
            labels.push(point.label.to_f32());
        }

        match &self.bbox {
            Some(bbox) => {
                let (x0, y0) = transform_coords(bbox.x0, bbox.y0, original_size, input_size);
                let (x1, y1) = transform_coords(bbox.x1, bbox.y1, original_size, input_size);
                coords.extend_from_slice(&[x0, y0, x1, y1]);
                labels.push(2.0);
                labels.push(3.0);
            }
            None => {
                // padding point required when no box is given
                coords.extend_from_slice(&[0.0, 0.0]);
                labels.push(-1.0);
            }
        }

        Ok((coords, labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGINAL: ImageSize = ImageSize {
        width: 2048,
        height: 1024,
    };
    const INPUT: ImageSize = ImageSize {
        width: 1024,
        height: 512,
    };

    #[test]
    fn encode_points_scales_and_pads() -> Result<(), SegmentError> {
        let prompt = SpatialPrompt::from_points(vec![
            PromptPoint::foreground(500.0, 300.0),
            PromptPoint::background(1000.0, 500.0),
        ]);
        let (coords, labels) = prompt.encode(ORIGINAL, INPUT)?;

        assert_eq!(labels, vec![1.0, 0.0, -1.0]);
        assert_eq!(coords.len(), 6);
        // half resolution in both axes
        assert_eq!(&coords[..4], &[250.0, 150.0, 500.0, 250.0]);
        // trailing padding point
        assert_eq!(&coords[4..], &[0.0, 0.0]);
        Ok(())
    }

    #[test]
    fn encode_box_uses_corner_labels() -> Result<(), SegmentError> {
        let prompt = SpatialPrompt::from_box(BoxPrompt {
            x0: 0.0,
            y0: 0.0,
            x1: 2048.0,
            y1: 1024.0,
        });
        let (coords, labels) = prompt.encode(ORIGINAL, INPUT)?;

        assert_eq!(labels, vec![2.0, 3.0]);
        assert_eq!(coords, vec![0.0, 0.0, 1024.0, 512.0]);
        Ok(())
    }

    #[test]
    fn encode_empty_prompt_is_an_error() {
        let prompt = SpatialPrompt::default();
        assert!(matches!(
            prompt.encode(ORIGINAL, INPUT),
            Err(SegmentError::EmptyPrompt)
        ));
    }

    #[test]
    fn prompt_round_trips_through_json() {
        let prompt = SpatialPrompt::from_points(vec![PromptPoint::foreground(10.0, 20.0)]);
        let json = serde_json::to_string(&prompt).unwrap();
        let back: SpatialPrompt = serde_json::from_str(&json).unwrap();
        assert_eq!(back.points, prompt.points);
        assert_eq!(back.multimask, prompt.multimask);
    }
}
