use colored::{Color, Colorize};

/// Display colors handed out to targets, in order
const PALETTE: [Color; 8] = [
    Color::Cyan,
    Color::Green,
    Color::Yellow,
    Color::Magenta,
    Color::Blue,
    Color::BrightCyan,
    Color::BrightGreen,
    Color::BrightMagenta,
];

/// Color assigned to one target; tags its label and highlighted matches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetColor(Color);

impl TargetColor {
    pub fn color(&self) -> Color {
        self.0
    }

    /// Wrap `text` in this color's escape codes
    pub fn paint(&self, text: &str) -> String {
        text.color(self.0).to_string()
    }
}

/// Color for the target at `index`; indices past the palette wrap around
pub fn color_for(index: usize) -> TargetColor {
    TargetColor(PALETTE[index % PALETTE.len()])
}

/// Number of distinct colors before indices start colliding
pub fn palette_len() -> usize {
    PALETTE.len()
}
