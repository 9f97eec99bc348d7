use crate::config::OverlayConfig;
use crate::overlay::{layer_shell, Overlay, OverlayError, PillLayout, BUTTON_RADIUS};
use crate::presenter::service::ServiceInput;
use crate::presenter::{PillMode, PillUiState};
use crate::relay::{Artwork, ControlAction};
use gtk4::glib;
use gtk4::prelude::*;
use std::f64::consts::{FRAC_PI_2, PI};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

const SYNC_INTERVAL: Duration = Duration::from_millis(33);
const READY_TIMEOUT: Duration = Duration::from_secs(5);
const VISUALIZER_BARS: [f64; 4] = [0.3, 0.9, 0.5, 0.7];

/// What the GTK thread should show next.
struct Frame {
    state: PillUiState,
    visible: bool,
    dirty: bool,
    closed: bool,
}

/// Asks the host thread for one pill window.
struct WindowRequest {
    config: OverlayConfig,
    frame: Arc<Mutex<Frame>>,
    events: mpsc::Sender<ServiceInput>,
    ready: mpsc::Sender<Result<(), OverlayError>>,
}

/// Toolkit side of the host thread. GTK may only ever be initialised on one
/// thread per process, so the host outlives every window it opens.
trait WindowBackend {
    fn init(&mut self) -> Result<(), OverlayError>;
    /// Takes over the host thread once `init` succeeded.
    fn serve(self, first: WindowRequest, requests: mpsc::Receiver<WindowRequest>);
}

/// Floating pill window. GTK runs on its own thread; this handle only writes
/// into the shared frame, which the GTK thread picks up on a timer.
pub struct GtkOverlay {
    frame: Arc<Mutex<Frame>>,
}

impl GtkOverlay {
    pub fn new(config: OverlayConfig, events: mpsc::Sender<ServiceInput>) -> Result<Self, OverlayError> {
        Self::open_on(gtk_host()?, config, events)
    }

    fn open_on(
        host: &mpsc::Sender<WindowRequest>,
        config: OverlayConfig,
        events: mpsc::Sender<ServiceInput>,
    ) -> Result<Self, OverlayError> {
        let frame = Arc::new(Mutex::new(Frame {
            state: PillUiState::default(),
            visible: false,
            dirty: true,
            closed: false,
        }));

        let (ready_tx, ready_rx) = mpsc::channel();
        host.send(WindowRequest {
            config,
            frame: frame.clone(),
            events,
            ready: ready_tx,
        })
        .map_err(|_| OverlayError::InitError)?;

        match ready_rx.recv_timeout(READY_TIMEOUT) {
            Ok(Ok(())) => Ok(Self { frame }),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                if let Ok(mut frame) = frame.lock() {
                    frame.closed = true;
                }
                Err(OverlayError::InitError)
            }
        }
    }

    fn update(&self, apply: impl FnOnce(&mut Frame)) {
        if let Ok(mut frame) = self.frame.lock() {
            apply(&mut frame);
            frame.dirty = true;
        }
    }
}

impl Overlay for GtkOverlay {
    fn render(&self, state: &PillUiState) {
        self.update(|frame| frame.state = state.clone());
    }

    fn show(&self) {
        self.update(|frame| frame.visible = true);
    }

    fn hide(&self) {
        self.update(|frame| frame.visible = false);
    }
}

impl Drop for GtkOverlay {
    fn drop(&mut self) {
        self.update(|frame| frame.closed = true);
    }
}

fn gtk_host() -> Result<&'static mpsc::Sender<WindowRequest>, OverlayError> {
    static HOST: OnceLock<mpsc::Sender<WindowRequest>> = OnceLock::new();

    if let Some(host) = HOST.get() {
        return Ok(host);
    }
    let host = spawn_host("island-gtk", || GtkBackend)?;
    Ok(HOST.get_or_init(|| host))
}

fn spawn_host<B, F>(name: &str, backend: F) -> Result<mpsc::Sender<WindowRequest>, OverlayError>
where
    B: WindowBackend,
    F: FnOnce() -> B + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || run_host(backend(), rx))
        .map_err(|e| OverlayError::GtkError(e.to_string()))?;
    Ok(tx)
}

/// Failed initialisation is answered per request and retried on the next one,
/// always from this same thread.
fn run_host<B: WindowBackend>(mut backend: B, requests: mpsc::Receiver<WindowRequest>) {
    while let Ok(request) = requests.recv() {
        match backend.init() {
            Ok(()) => return backend.serve(request, requests),
            Err(e) => {
                tracing::warn!("GTK overlay unavailable: {}", e);
                let _ = request.ready.send(Err(e));
            }
        }
    }
}

struct GtkBackend;

impl WindowBackend for GtkBackend {
    fn init(&mut self) -> Result<(), OverlayError> {
        gtk4::init().map_err(|e| OverlayError::GtkError(e.to_string()))?;
        let display = gdk4::Display::default().ok_or(OverlayError::NoDisplay)?;

        let provider = gtk4::CssProvider::new();
        provider.load_from_data("window { background: transparent; }");
        gtk4::style_context_add_provider_for_display(
            &display,
            &provider,
            gtk4::STYLE_PROVIDER_PRIORITY_APPLICATION,
        );
        Ok(())
    }

    fn serve(self, first: WindowRequest, requests: mpsc::Receiver<WindowRequest>) {
        open_window(first);
        glib::timeout_add_local(SYNC_INTERVAL, move || {
            while let Ok(request) = requests.try_recv() {
                open_window(request);
            }
            glib::ControlFlow::Continue
        });

        glib::MainLoop::new(None, false).run();
        tracing::debug!("GTK overlay loop ended");
    }
}

fn open_window(request: WindowRequest) {
    build_window(&request.config, request.frame, request.events);
    let _ = request.ready.send(Ok(()));
}

fn build_window(config: &OverlayConfig, frame: Arc<Mutex<Frame>>, events: mpsc::Sender<ServiceInput>) {
    let window = gtk4::Window::builder()
        .title("island")
        .decorated(false)
        .resizable(false)
        .can_focus(false)
        .build();
    window.set_opacity(config.opacity);
    layer_shell::anchor_top_center(&window, config.offset_y);

    let layout = PillLayout::for_mode(config, PillMode::Compact);
    let drawing_area = gtk4::DrawingArea::new();
    drawing_area.set_content_width(layout.width as i32);
    drawing_area.set_content_height(layout.height as i32);

    let frame_draw = frame.clone();
    let config_draw = config.clone();
    drawing_area.set_draw_func(move |_, cr, _, _| {
        if let Ok(frame) = frame_draw.lock() {
            draw_pill(cr, &config_draw, &frame.state);
        }
    });

    let click = gtk4::GestureClick::new();
    let frame_click = frame.clone();
    let config_click = config.clone();
    click.connect_pressed(move |_, _, x, y| {
        let mode = frame_click
            .lock()
            .map(|frame| frame.state.mode)
            .unwrap_or(PillMode::Compact);
        let event = PillLayout::for_mode(&config_click, mode).hit_test(mode, x, y);
        let _ = events.send(ServiceInput::Overlay(event));
    });
    drawing_area.add_controller(click);

    window.set_child(Some(&drawing_area));
    window.set_default_size(layout.width as i32, layout.height as i32);

    let config_sync = config.clone();
    glib::timeout_add_local(SYNC_INTERVAL, move || {
        let Ok(mut frame) = frame.lock() else {
            window.destroy();
            return glib::ControlFlow::Break;
        };

        if frame.closed {
            window.destroy();
            return glib::ControlFlow::Break;
        }

        if frame.dirty {
            frame.dirty = false;
            let layout = PillLayout::for_mode(&config_sync, frame.state.mode);
            drawing_area.set_content_width(layout.width as i32);
            drawing_area.set_content_height(layout.height as i32);
            window.set_default_size(layout.width as i32, layout.height as i32);
            window.set_visible(frame.visible && frame.state.mode != PillMode::Hidden);
            drawing_area.queue_draw();
        }

        glib::ControlFlow::Continue
    });
}

fn draw_pill(cr: &cairo::Context, config: &OverlayConfig, state: &PillUiState) {
    let layout = PillLayout::for_mode(config, state.mode);

    cr.set_operator(cairo::Operator::Source);
    cr.set_source_rgba(0.0, 0.0, 0.0, 0.0);
    let _ = cr.paint();
    cr.set_operator(cairo::Operator::Over);

    rounded_rect(cr, 0.0, 0.0, layout.width, layout.height, (layout.height / 2.0).min(30.0));
    cr.set_source_rgb(0.0, 0.0, 0.0);
    let _ = cr.fill();

    match state.mode {
        PillMode::Expanded => draw_expanded(cr, &layout, state),
        PillMode::Hidden => {}
        PillMode::Compact | PillMode::Notification => draw_compact(cr, &layout, state),
    }
}

fn draw_compact(cr: &cairo::Context, layout: &PillLayout, state: &PillUiState) {
    let art = 28.0;
    draw_artwork(cr, state.artwork.as_ref(), 12.0, (layout.height - art) / 2.0, art);

    let text_x = 12.0 + art + 10.0;
    let text_width = layout.width - text_x - 40.0;
    draw_text(cr, &state.text, text_x, layout.height / 2.0 + 5.0, text_width, 13.0, true, (1.0, 1.0, 1.0));

    let (r, g, b) = if state.is_playing {
        (0x1d as f64 / 255.0, 0xb9 as f64 / 255.0, 0x54 as f64 / 255.0)
    } else {
        (0.5, 0.5, 0.5)
    };
    let bar_height = 16.0;
    let base_y = (layout.height + bar_height) / 2.0;
    let mut x = layout.width - 12.0 - 20.0;
    for fraction in VISUALIZER_BARS {
        let h = if state.is_playing { bar_height * (fraction + 1.0) / 2.0 } else { bar_height * fraction };
        cr.rectangle(x, base_y - h, 3.0, h);
        x += 5.0;
    }
    cr.set_source_rgb(r, g, b);
    let _ = cr.fill();
}

fn draw_expanded(cr: &cairo::Context, layout: &PillLayout, state: &PillUiState) {
    let art = 60.0;
    draw_artwork(cr, state.artwork.as_ref(), 16.0, 16.0, art);

    let text_x = 16.0 + art + 16.0;
    let text_width = layout.width - text_x - 16.0;
    draw_text(cr, &state.text, text_x, 40.0, text_width, 16.0, true, (1.0, 1.0, 1.0));
    draw_text(cr, &state.sub_text, text_x, 62.0, text_width, 14.0, false, (0.6, 0.6, 0.6));

    for (action, cx, cy) in layout.buttons() {
        match action {
            ControlAction::PlayPause => {
                cr.arc(cx, cy, BUTTON_RADIUS, 0.0, 2.0 * PI);
                cr.set_source_rgb(1.0, 1.0, 1.0);
                let _ = cr.fill();
                cr.set_source_rgb(0.0, 0.0, 0.0);
                if state.is_playing {
                    cr.rectangle(cx - 7.0, cy - 8.0, 5.0, 16.0);
                    cr.rectangle(cx + 2.0, cy - 8.0, 5.0, 16.0);
                } else {
                    triangle(cr, cx - 5.0, cy, 14.0, 1.0);
                }
                let _ = cr.fill();
            }
            ControlAction::Next => {
                cr.set_source_rgb(1.0, 1.0, 1.0);
                triangle(cr, cx - 8.0, cy, 13.0, 1.0);
                cr.rectangle(cx + 5.0, cy - 8.0, 3.0, 16.0);
                let _ = cr.fill();
            }
            ControlAction::Prev => {
                cr.set_source_rgb(1.0, 1.0, 1.0);
                triangle(cr, cx + 8.0, cy, 13.0, -1.0);
                cr.rectangle(cx - 8.0, cy - 8.0, 3.0, 16.0);
                let _ = cr.fill();
            }
        }
    }
}

/// Triangle with its flat side at `x`, pointing right (`direction` 1) or left (-1).
fn triangle(cr: &cairo::Context, x: f64, cy: f64, length: f64, direction: f64) {
    cr.move_to(x, cy - length / 2.0);
    cr.line_to(x + direction * length, cy);
    cr.line_to(x, cy + length / 2.0);
    cr.close_path();
}

#[allow(clippy::too_many_arguments)]
fn draw_text(
    cr: &cairo::Context,
    text: &str,
    x: f64,
    baseline: f64,
    max_width: f64,
    size: f64,
    bold: bool,
    (r, g, b): (f64, f64, f64),
) {
    let weight = if bold { cairo::FontWeight::Bold } else { cairo::FontWeight::Normal };
    let _ = cr.save();
    cr.rectangle(x, baseline - size * 1.5, max_width.max(0.0), size * 2.0);
    cr.clip();
    cr.select_font_face("Sans", cairo::FontSlant::Normal, weight);
    cr.set_font_size(size);
    cr.set_source_rgb(r, g, b);
    cr.move_to(x, baseline);
    let _ = cr.show_text(text);
    let _ = cr.restore();
}

fn draw_artwork(cr: &cairo::Context, artwork: Option<&Artwork>, x: f64, y: f64, size: f64) {
    rounded_rect(cr, x, y, size, size, size / 4.0);

    match artwork.and_then(artwork_surface) {
        Some((surface, width, height)) => {
            let _ = cr.save();
            cr.clip();
            cr.translate(x, y);
            cr.scale(size / width as f64, size / height as f64);
            let _ = cr.set_source_surface(&surface, 0.0, 0.0);
            let _ = cr.paint();
            let _ = cr.restore();
        }
        None => {
            cr.set_source_rgb(0x22 as f64 / 255.0, 0x22 as f64 / 255.0, 0x22 as f64 / 255.0);
            let _ = cr.fill();
            cr.arc(x + size / 2.0, y + size / 2.0, size / 8.0, 0.0, 2.0 * PI);
            cr.set_source_rgb(0.5, 0.5, 0.5);
            let _ = cr.fill();
        }
    }
}

fn artwork_surface(artwork: &Artwork) -> Option<(cairo::ImageSurface, u32, u32)> {
    let stride = cairo::Format::ARgb32.stride_for_width(artwork.width).ok()?;
    let data = premultiplied_argb(artwork, stride as usize)?;
    let surface = cairo::ImageSurface::create_for_data(
        data,
        cairo::Format::ARgb32,
        artwork.width as i32,
        artwork.height as i32,
        stride,
    )
    .ok()?;
    Some((surface, artwork.width, artwork.height))
}

/// Convert straight RGBA into cairo's native-endian premultiplied ARGB32.
fn premultiplied_argb(artwork: &Artwork, stride: usize) -> Option<Vec<u8>> {
    let row_len = artwork.width as usize * 4;
    if row_len == 0 || artwork.rgba.len() != row_len * artwork.height as usize || stride < row_len {
        return None;
    }

    let mut data = vec![0u8; stride * artwork.height as usize];
    for (row, pixels) in artwork.rgba.chunks_exact(row_len).enumerate() {
        for (col, px) in pixels.chunks_exact(4).enumerate() {
            let a = px[3] as u32;
            let premultiply = |c: u8| (c as u32 * a + 127) / 255;
            let argb = (a << 24) | (premultiply(px[0]) << 16) | (premultiply(px[1]) << 8) | premultiply(px[2]);
            let offset = row * stride + col * 4;
            data[offset..offset + 4].copy_from_slice(&argb.to_ne_bytes());
        }
    }
    Some(data)
}

fn rounded_rect(cr: &cairo::Context, x: f64, y: f64, width: f64, height: f64, radius: f64) {
    cr.new_sub_path();
    cr.arc(x + width - radius, y + radius, radius, -FRAC_PI_2, 0.0);
    cr.arc(x + width - radius, y + height - radius, radius, 0.0, FRAC_PI_2);
    cr.arc(x + radius, y + height - radius, radius, FRAC_PI_2, PI);
    cr.arc(x + radius, y + radius, radius, PI, 3.0 * FRAC_PI_2);
    cr.close_path();
}
