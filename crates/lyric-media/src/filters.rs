//! FFmpeg filter graph construction for lyric videos.

use std::path::{Path, PathBuf};

use crate::timeline::OverlaySpec;

/// Output frame width (portrait).
pub const OUTPUT_WIDTH: u32 = 1080;
/// Output frame height (portrait).
pub const OUTPUT_HEIGHT: u32 = 1920;
/// Output frame rate.
pub const OUTPUT_FPS: u32 = 30;

/// Label of the composed video stream.
pub const VIDEO_OUT_LABEL: &str = "vout";

/// Text rendering parameters shared by every overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    /// Base font size in pixels, before the scale ramp
    pub font_size: u32,
    /// Optional font file; FFmpeg's default font otherwise
    pub font_file: Option<PathBuf>,
    pub font_color: String,
    pub border_width: u32,
    pub border_color: String,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 96,
            font_file: None,
            font_color: "white".to_string(),
            border_width: 4,
            border_color: "black".to_string(),
        }
    }
}

/// Fill the portrait frame, cropping the overflow, at a constant frame rate.
pub fn background_filter() -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},fps={fps},setsar=1",
        w = OUTPUT_WIDTH,
        h = OUTPUT_HEIGHT,
        fps = OUTPUT_FPS,
    )
}

/// Opacity expression over `t`; the fade-out window takes precedence.
pub fn alpha_expr(overlay: &OverlaySpec) -> String {
    let start = overlay.active_start_secs;
    let end = overlay.active_end_secs;

    let mut expr = "1".to_string();
    if overlay.fade_in_secs > 0.0 {
        expr = format!(
            "if(lt(t-{s:.3},{fi:.3}),(t-{s:.3})/{fi:.3},{expr})",
            s = start,
            fi = overlay.fade_in_secs,
            expr = expr,
        );
    }
    if overlay.fade_out_secs > 0.0 {
        expr = format!(
            "if(lt({e:.3}-t,{fo:.3}),({e:.3}-t)/{fo:.3},{expr})",
            e = end,
            fo = overlay.fade_out_secs,
            expr = expr,
        );
    }
    format!("clip({},0,1)", expr)
}

/// Font size expression ramping linearly across the active interval.
pub fn font_size_expr(overlay: &OverlaySpec, base_size: u32) -> String {
    format!(
        "{base}*({s0:.3}+{ds:.3}*clip((t-{start:.3})/{dur:.3},0,1))",
        base = base_size,
        s0 = overlay.scale_start,
        ds = overlay.scale_end - overlay.scale_start,
        start = overlay.active_start_secs,
        dur = overlay.duration_secs(),
    )
}

/// One centered `drawtext` reading its text from `text_file`.
pub fn drawtext_filter(overlay: &OverlaySpec, text_file: &Path, style: &TextStyle) -> String {
    let mut filter = format!(
        "drawtext=textfile='{file}':expansion=none:fontcolor={color}:borderw={bw}:bordercolor={bc}",
        file = escape_filter_path(&text_file.to_string_lossy()),
        color = style.font_color,
        bw = style.border_width,
        bc = style.border_color,
    );

    if let Some(font) = &style.font_file {
        filter.push_str(&format!(
            ":fontfile='{}'",
            escape_filter_path(&font.to_string_lossy())
        ));
    }

    filter.push_str(&format!(
        ":fontsize='{size}':x='(w-text_w)/2':y='(h-text_h)/2':alpha='{alpha}':enable='between(t,{s:.3},{e:.3})'",
        size = font_size_expr(overlay, style.font_size),
        alpha = alpha_expr(overlay),
        s = overlay.active_start_secs,
        e = overlay.active_end_secs,
    ));

    filter
}

/// Full filter graph: background conform followed by one drawtext per
/// overlay in order, so later cues draw on top.
pub fn build_lyric_filter(overlays: &[(OverlaySpec, PathBuf)], style: &TextStyle) -> String {
    let mut chain = vec![background_filter()];
    chain.extend(
        overlays
            .iter()
            .map(|(overlay, text_file)| drawtext_filter(overlay, text_file, style)),
    );

    format!("[0:v]{}[{}]", chain.join(","), VIDEO_OUT_LABEL)
}

fn escape_filter_path(path: &str) -> String {
    path.replace('\\', "\\\\").replace('\'', "\\'").replace(':', "\\:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{plan_overlays, CompositorSettings};
    use lyric_models::LyricCue;

    fn overlay(start_ms: u64, end_ms: u64) -> OverlaySpec {
        plan_overlays(
            &CompositorSettings::default(),
            &[LyricCue::new("Hello", start_ms, end_ms)],
        )
        .remove(0)
    }

    #[test]
    fn test_background_filter() {
        assert_eq!(
            background_filter(),
            "scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920,fps=30,setsar=1"
        );
    }

    #[test]
    fn test_alpha_expr_fades() {
        let expr = alpha_expr(&overlay(500, 2000));
        assert!(expr.starts_with("clip(if(lt(2.000-t,0.100)"));
        assert!(expr.contains("(t-0.500)/0.100"));
    }

    #[test]
    fn test_alpha_expr_without_fades() {
        let mut spec = overlay(0, 1000);
        spec.fade_in_secs = 0.0;
        spec.fade_out_secs = 0.0;
        assert_eq!(alpha_expr(&spec), "clip(1,0,1)");
    }

    #[test]
    fn test_font_size_ramp() {
        let expr = font_size_expr(&overlay(1000, 3000), 96);
        assert_eq!(expr, "96*(1.000+0.100*clip((t-1.000)/2.000,0,1))");
    }

    #[test]
    fn test_drawtext_window_and_font() {
        let style = TextStyle {
            font_file: Some(PathBuf::from("/fonts/Bold: Font.ttf")),
            ..Default::default()
        };
        let filter = drawtext_filter(&overlay(0, 500), Path::new("/tmp/cue_0.txt"), &style);
        assert!(filter.starts_with("drawtext=textfile='/tmp/cue_0.txt':expansion=none"));
        assert!(filter.contains("fontfile='/fonts/Bold\\: Font.ttf'"));
        assert!(filter.contains("enable='between(t,0.000,0.500)'"));
        assert!(filter.contains("x='(w-text_w)/2'"));
    }

    #[test]
    fn test_lyric_filter_chains_overlays_in_order() {
        let overlays = vec![
            (overlay(0, 500), PathBuf::from("a.txt")),
            (overlay(400, 1200), PathBuf::from("b.txt")),
        ];
        let filter = build_lyric_filter(&overlays, &TextStyle::default());
        assert!(filter.starts_with("[0:v]scale=1080:1920"));
        assert!(filter.ends_with("[vout]"));
        let a = filter.find("textfile='a.txt'").unwrap();
        let b = filter.find("textfile='b.txt'").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_lyric_filter_without_overlays() {
        let filter = build_lyric_filter(&[], &TextStyle::default());
        assert_eq!(filter, format!("[0:v]{}[vout]", background_filter()));
    }
}
