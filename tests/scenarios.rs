//! End-to-end scenarios exercised through the public [`tarp::Context`] API,
//! using a recording backend instead of a real GPU device so these run
//! without a wgpu adapter.

use tarp::{
    Color, Context, FillRule, FrameInfo, GradientBuilder, GradientId, GradientMesh, Mesh,
    Paint, RasterBackend, StencilOp, StencilTest, Style, StrokeCap, StrokeJoin, StrokeStyle,
    TarpError, Vec2,
};

#[derive(Default)]
struct RecordingBackend {
    solid_draws: Vec<(StencilOp, StencilTest)>,
    gradient_draws: Vec<GradientId>,
    uploaded_ramps: Vec<GradientId>,
    stencil_clears: u32,
}

impl RasterBackend for RecordingBackend {
    fn begin_frame(&mut self, _info: FrameInfo) -> Result<(), TarpError> {
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), TarpError> {
        Ok(())
    }

    fn draw_solid(&mut self, _mesh: Mesh<'_>, _color: Color, op: StencilOp, test: StencilTest) {
        self.solid_draws.push((op, test));
    }

    fn draw_gradient(&mut self, mesh: GradientMesh<'_>, _op: StencilOp, _test: StencilTest) {
        self.gradient_draws.push(mesh.gradient_id);
    }

    fn upload_gradient_ramp(&mut self, gradient_id: GradientId, _ramp: &[[u8; 4]]) {
        self.uploaded_ramps.push(gradient_id);
    }

    fn clear_stencil(&mut self) {
        self.stencil_clears += 1;
    }
}

#[test]
fn rect_fill_even_odd() {
    let mut ctx = Context::new(RecordingBackend::default());
    let handle = ctx.create_path();
    ctx.path_mut(handle)
        .unwrap()
        .add_rect(Vec2::new(0.0, 0.0), Vec2::new(50.0, 50.0));

    let mut style = Style::fill(Paint::Color(Color::rgb(1.0, 0.0, 0.0)));
    style.fill_rule = FillRule::EvenOdd;

    ctx.draw_path(handle, &style).unwrap();
    let draws = &ctx.backend().solid_draws;
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].0, StencilOp::Invert);
    assert_eq!(draws[1].0, StencilOp::ZeroCover);
}

#[test]
fn circle_stroke_with_miter_joins() {
    let mut ctx = Context::new(RecordingBackend::default());
    let handle = ctx.create_path();
    ctx.path_mut(handle).unwrap().add_circle(Vec2::new(0.0, 0.0), 20.0);

    let mut style = Style::fill(Paint::None);
    style.stroke_paint = Paint::Color(Color::BLACK);
    style.stroke_style = StrokeStyle { width: 4.0, join: StrokeJoin::Miter, ..Default::default() };

    ctx.draw_path(handle, &style).unwrap();
    // stroke-only path: one replace pass, one cover pass.
    assert_eq!(ctx.backend().solid_draws.len(), 2);
    assert_eq!(ctx.backend().solid_draws[0].0, StencilOp::Replace);
}

#[test]
fn dashed_open_line() {
    let mut ctx = Context::new(RecordingBackend::default());
    let handle = ctx.create_path();
    {
        let path = ctx.path_mut(handle).unwrap();
        path.move_to(Vec2::new(0.0, 0.0));
        path.line_to(Vec2::new(200.0, 0.0)).unwrap();
    }

    let mut style = Style::fill(Paint::None);
    style.stroke_paint = Paint::Color(Color::BLACK);
    style.stroke_style = StrokeStyle {
        width: 2.0,
        cap: StrokeCap::Butt,
        dash_pattern: vec![10.0, 10.0],
        ..Default::default()
    };

    assert!(ctx.draw_path(handle, &style).is_ok());
    assert_eq!(ctx.backend().solid_draws.len(), 2);
}

#[test]
fn nested_clipping_intersects_and_unwinds() {
    let mut ctx = Context::new(RecordingBackend::default());

    let outer = ctx.create_path();
    ctx.path_mut(outer).unwrap().add_rect(Vec2::new(0.0, 0.0), Vec2::new(100.0, 100.0));
    ctx.cache_path(outer, &Style::fill(Paint::Color(Color::BLACK))).unwrap();

    let inner = ctx.create_path();
    ctx.path_mut(inner).unwrap().add_rect(Vec2::new(25.0, 25.0), Vec2::new(50.0, 50.0));
    ctx.cache_path(inner, &Style::fill(Paint::Color(Color::BLACK))).unwrap();

    assert_eq!(ctx.clip_depth(), 0);
    ctx.begin_clipping(outer, FillRule::NonZero).unwrap();
    assert_eq!(ctx.clip_depth(), 1);
    ctx.begin_clipping(inner, FillRule::NonZero).unwrap();
    assert_eq!(ctx.clip_depth(), 2);

    ctx.end_clipping();
    assert_eq!(ctx.clip_depth(), 1);
    ctx.end_clipping();
    assert_eq!(ctx.clip_depth(), 0);

    ctx.reset_clipping();
    assert_eq!(ctx.clip_depth(), 0);
    assert!(ctx.backend().stencil_clears > 0);
}

#[test]
fn linear_gradient_fill_uploads_ramp_and_draws() {
    let mut ctx = Context::new(RecordingBackend::default());
    let gradient = GradientBuilder::linear(Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0))
        .add_stop(0.0, Color::BLACK)
        .add_stop(1.0, Color::WHITE)
        .finish()
        .unwrap();
    let gradient_id = ctx.register_gradient(gradient);

    let handle = ctx.create_path();
    ctx.path_mut(handle).unwrap().add_rect(Vec2::new(0.0, 0.0), Vec2::new(100.0, 40.0));
    let style = Style::fill(Paint::Gradient(gradient_id));

    ctx.draw_path(handle, &style).unwrap();
    assert_eq!(ctx.backend().gradient_draws, vec![gradient_id]);
    assert_eq!(ctx.backend().uploaded_ramps, vec![gradient_id]);
}

#[test]
fn radial_gradient_sample_endpoints_match_stops() {
    let gradient = GradientBuilder::radial(Vec2::ZERO, Vec2::new(10.0, 10.0), Vec2::ZERO)
        .add_stop(0.0, Color::rgba(1.0, 0.0, 0.0, 1.0))
        .add_stop(1.0, Color::rgba(0.0, 0.0, 1.0, 1.0))
        .finish()
        .unwrap();
    assert_eq!(gradient.sample(0.0), Color::rgba(1.0, 0.0, 0.0, 1.0));
    assert_eq!(gradient.sample(1.0), Color::rgba(0.0, 0.0, 1.0, 1.0));
}

#[test]
fn drawing_an_unregistered_gradient_id_does_not_panic() {
    let mut ctx = Context::new(RecordingBackend::default());
    let handle = ctx.create_path();
    ctx.path_mut(handle).unwrap().add_rect(Vec2::new(0.0, 0.0), Vec2::new(10.0, 10.0));
    let style = Style::fill(Paint::Gradient(GradientId(999)));
    assert!(ctx.draw_path(handle, &style).is_ok());
    assert!(ctx.backend().gradient_draws.is_empty());
}
