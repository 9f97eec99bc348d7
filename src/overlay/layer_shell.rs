/// Pin the pill to the top centre of the output above other windows.
#[cfg(feature = "layer-shell")]
pub fn anchor_top_center(window: &gtk4::Window, offset_y: i32) {
    use gtk4_layer_shell::{Edge, KeyboardMode, Layer, LayerShell};

    window.init_layer_shell();
    window.set_layer(Layer::Overlay);
    window.set_keyboard_mode(KeyboardMode::None);
    window.set_anchor(Edge::Top, true);
    window.set_margin(Edge::Top, offset_y);
}

#[cfg(not(feature = "layer-shell"))]
pub fn anchor_top_center(_window: &gtk4::Window, _offset_y: i32) {
    tracing::debug!("Built without layer-shell, window placement is left to the compositor");
}
