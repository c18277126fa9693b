//! Property tests for command recording.
//!
//! Covers snapshot isolation of style per command and the rule that invalid
//! calls never disturb the buffer.

use canvas_core::{Color, DrawOp, DrawingContext, Paint};
use proptest::prelude::*;

/// A recorded-or-style call in a random drawing session.
#[derive(Debug, Clone)]
enum Call {
    Fill([u8; 3]),
    LineWidth(f32),
    FillRect(f32, f32, f32, f32),
    StrokeRect(f32, f32, f32, f32),
}

fn call() -> impl Strategy<Value = Call> {
    let coord = -500.0f32..500.0;
    prop_oneof![
        any::<[u8; 3]>().prop_map(Call::Fill),
        (0.1f32..50.0).prop_map(Call::LineWidth),
        (coord.clone(), coord.clone(), coord.clone(), coord.clone())
            .prop_map(|(x, y, w, h)| Call::FillRect(x, y, w, h)),
        (coord.clone(), coord.clone(), coord.clone(), coord)
            .prop_map(|(x, y, w, h)| Call::StrokeRect(x, y, w, h)),
    ]
}

proptest! {
    #[test]
    fn recorded_style_matches_style_at_record_time(calls in prop::collection::vec(call(), 1..64)) {
        let mut ctx = DrawingContext::new("prop");
        let mut expected = Vec::new();
        let mut fill = Color::BLACK;
        let mut width = 1.0f32;

        for c in &calls {
            match *c {
                Call::Fill([r, g, b]) => {
                    ctx.set_fill_style(Color::rgba8(r, g, b, 255)).expect("color");
                    fill = Color::rgba8(r, g, b, 255);
                }
                Call::LineWidth(w) => {
                    ctx.set_line_width(w).expect("width");
                    width = w;
                }
                Call::FillRect(x, y, w, h) => {
                    ctx.fill_rect(x, y, w, h).expect("fill");
                    expected.push((fill, width));
                }
                Call::StrokeRect(x, y, w, h) => {
                    ctx.stroke_rect(x, y, w, h).expect("stroke");
                    expected.push((fill, width));
                }
            }
        }

        prop_assert_eq!(ctx.buffer().len(), expected.len());
        for (cmd, (fill, width)) in ctx.buffer().iter().zip(expected) {
            prop_assert_eq!(&cmd.style.fill, &Paint::Color(fill));
            prop_assert_eq!(cmd.style.line_width, width);
        }
    }

    #[test]
    fn invalid_geometry_never_records(x in prop::num::f32::ANY, y in prop::num::f32::ANY) {
        let mut ctx = DrawingContext::new("prop");
        let result = ctx.fill_rect(x, y, 1.0, 1.0);
        prop_assert_eq!(result.is_ok(), x.is_finite() && y.is_finite());
        prop_assert_eq!(ctx.buffer().len(), usize::from(result.is_ok()));
    }

    #[test]
    fn negative_extents_record_and_normalize(x in -100.0f32..100.0, y in -100.0f32..100.0,
                                             w in -100.0f32..100.0, h in -100.0f32..100.0) {
        let mut ctx = DrawingContext::new("prop");
        ctx.fill_rect(x, y, w, h).expect("finite rect");
        let cmd = ctx.buffer().iter().next().expect("one command");
        let DrawOp::FillRect(rect) = cmd.op else {
            panic!("expected fillRect");
        };
        let n = rect.normalized();
        prop_assert!(n.width >= 0.0 && n.height >= 0.0);
        prop_assert_eq!(n.left(), rect.left());
        prop_assert_eq!(n.y, rect.top());
    }
}
