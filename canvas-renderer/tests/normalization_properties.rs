//! Property test: a rectangle with negative extents rasterizes exactly
//! like its normalized equivalent.

use std::sync::Arc;

use canvas_core::{BufferPolicy, DrawingContext};
use canvas_renderer::{new_bitmap, ImageStore, Rasterizer, TextConfig, TextRasterizer};
use proptest::prelude::*;

fn rasterize(x: f32, y: f32, w: f32, h: f32, stroke: bool) -> Vec<u8> {
    let mut ctx = DrawingContext::new("prop");
    ctx.set_line_width(3.0).expect("width");
    if stroke {
        ctx.stroke_rect(x, y, w, h).expect("stroke");
    } else {
        ctx.fill_rect(x, y, w, h).expect("fill");
    }
    let commands = ctx.take_commands(BufferPolicy::ClearOnFlush);

    let text = TextRasterizer::new(&TextConfig {
        load_system_fonts: false,
        ..TextConfig::default()
    });
    let mut bitmap = new_bitmap(64, 64).expect("bitmap");
    Rasterizer::new(Arc::new(ImageStore::new()), text)
        .replay(&mut bitmap, &commands)
        .expect("replay");
    bitmap.data().to_vec()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn negative_extents_rasterize_like_normalized(
        x in 0i32..64, y in 0i32..64, w in -40i32..40, h in -40i32..40, stroke in any::<bool>()
    ) {
        #[allow(clippy::cast_precision_loss)]
        let (x, y, w, h) = (x as f32, y as f32, w as f32, h as f32);
        let (nx, nw) = if w < 0.0 { (x + w, -w) } else { (x, w) };
        let (ny, nh) = if h < 0.0 { (y + h, -h) } else { (y, h) };

        prop_assert_eq!(rasterize(x, y, w, h, stroke), rasterize(nx, ny, nw, nh, stroke));
    }
}
