use std::path::{Path, PathBuf};

use ab_glyph::FontVec;

/// Searched in order when no font is given and `fonts/` holds nothing usable.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
];

/// Font files to try, best first. An explicit font is the only candidate.
pub fn candidates(explicit: Option<&Path>, fonts_dir: &Path) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![path.to_path_buf()];
    }

    let mut local: Vec<PathBuf> = std::fs::read_dir(fonts_dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| is_font_file(p))
                .collect()
        })
        .unwrap_or_default();
    local.sort();
    local.extend(SYSTEM_FONTS.iter().map(PathBuf::from));
    local
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("ttc"))
}

/// Loads the first usable candidate. `None` means text stimuli cannot be
/// rendered.
pub fn load(explicit: Option<&Path>) -> Option<(PathBuf, FontVec)> {
    for path in candidates(explicit, Path::new("fonts")) {
        if explicit.is_none() && !path.is_file() {
            continue;
        }
        match onset_render::load_font(&path) {
            Ok(font) => {
                tracing::info!(path = %path.display(), "font loaded");
                return Some((path, font));
            }
            Err(err) => tracing::warn!(%err, "font rejected"),
        }
    }
    tracing::warn!("no font loaded, text stimuli will not be displayed");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_font_is_the_only_candidate() {
        let c = candidates(Some(Path::new("my.otf")), Path::new("fonts"));
        assert_eq!(c, vec![PathBuf::from("my.otf")]);
    }

    #[test]
    fn local_fonts_come_before_system_fonts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.TTF", "a.ttc", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let c = candidates(None, dir.path());
        assert_eq!(c[0], dir.path().join("a.ttc"));
        assert_eq!(c[1], dir.path().join("b.TTF"));
        assert_eq!(c.len(), 2 + SYSTEM_FONTS.len());
    }

    #[test]
    fn missing_fonts_dir_falls_back_to_system() {
        let c = candidates(None, Path::new("/definitely/not/a/dir"));
        assert_eq!(c.len(), SYSTEM_FONTS.len());
    }

    #[test]
    fn unreadable_explicit_font_loads_nothing() {
        assert!(load(Some(Path::new("/no/such/font.ttf"))).is_none());
    }
}
