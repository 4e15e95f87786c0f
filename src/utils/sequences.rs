//! Image sequence patterns: frame index -> file path
//!
//! Supported placeholders (exactly one per pattern):
//! - `####`   - hash run, padding = number of hashes
//! - `%04d`   - printf style, `%d` for no padding
//! - `{}`     - unpadded number
//!
//! Flipbook indices are 1-based; `start` is the on-disk number of frame 1,
//! so `shot.####.png` with start 1001 maps frame 1 -> `shot.1001.png`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::entities::{FrameError, Locator, UrlPolicy};

/// Parsed sequence pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencePattern {
    prefix: String,
    suffix: String,
    padding: usize,
    start: usize,
}

impl SequencePattern {
    /// Parse a pattern string. Frame 1 maps to on-disk number `start`.
    pub fn parse(pattern: &str, start: usize) -> Result<Self, FrameError> {
        let (prefix, padding, suffix) = split_placeholder(pattern).ok_or_else(|| {
            FrameError::InvalidConfig(format!(
                "Pattern '{}' has no frame placeholder (####, %04d or {{}})",
                pattern
            ))
        })?;

        if split_placeholder(&suffix).is_some() {
            return Err(FrameError::InvalidConfig(format!(
                "Pattern '{}' has more than one frame placeholder",
                pattern
            )));
        }

        Ok(Self {
            prefix,
            suffix,
            padding,
            start,
        })
    }

    /// Build a pattern from one existing frame, e.g. `/renders/shot.0001.png`
    /// -> `/renders/shot.####.png`. Start is taken from that frame's number.
    pub fn from_sample_path(path: &Path) -> Result<Self, FrameError> {
        let (prefix, number, ext, padding) = split_sequence_path(path).ok_or_else(|| {
            FrameError::InvalidConfig(format!("{} is not a numbered frame", path.display()))
        })?;

        Ok(Self {
            prefix,
            suffix: format!(".{}", ext),
            padding,
            start: number,
        })
    }

    /// On-disk number of frame 1
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Same pattern, different first number
    pub fn with_start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    /// Path for an on-disk frame number
    pub fn path_for_number(&self, number: usize) -> String {
        format!(
            "{}{:0width$}{}",
            self.prefix,
            number,
            self.suffix,
            width = self.padding
        )
    }

    /// Glob matching every frame of this sequence
    pub fn glob_mask(&self) -> String {
        format!("{}*{}", glob::Pattern::escape(&self.prefix), glob::Pattern::escape(&self.suffix))
    }

    /// Scan the filesystem for the contiguous run of frames starting at `start`.
    ///
    /// Returns (start, count). Errors if frame `start` itself doesn't exist.
    pub fn detect_range(&self) -> Result<(usize, usize), FrameError> {
        let mask = self.glob_mask();
        let numbers = glob_numbers(&mask, &self.prefix, &self.suffix)?;
        debug!("Sequence {}: {} files on disk", mask, numbers.len());

        if !numbers.contains(&self.start) {
            return Err(FrameError::InvalidConfig(format!(
                "First frame {} not found",
                self.path_for_number(self.start)
            )));
        }

        let count = (self.start..)
            .take_while(|n| numbers.contains(n))
            .count();

        info!(
            "Detected sequence {}: frames {}..{} ({} frames)",
            mask,
            self.start,
            self.start + count - 1,
            count
        );
        Ok((self.start, count))
    }
}

impl UrlPolicy for SequencePattern {
    fn locate(&self, frame_idx: usize) -> Locator {
        Locator::new(self.path_for_number(self.start + frame_idx.saturating_sub(1)))
    }
}

/// Find the placeholder: returns (prefix, padding, suffix)
fn split_placeholder(pattern: &str) -> Option<(String, usize, String)> {
    if let Some(pos) = pattern.find('#') {
        let hashes = pattern[pos..].chars().take_while(|&c| c == '#').count();
        return Some((
            pattern[..pos].to_string(),
            hashes,
            pattern[pos + hashes..].to_string(),
        ));
    }

    if let Some(pos) = pattern.find("{}") {
        return Some((pattern[..pos].to_string(), 0, pattern[pos + 2..].to_string()));
    }

    // %d / %0Nd / %Nd
    let mut search = 0;
    while let Some(rel) = pattern[search..].find('%') {
        let pos = search + rel;
        let rest = &pattern[pos + 1..];
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if rest[digits.len()..].starts_with('d') {
            let padding = digits.parse::<usize>().unwrap_or(0);
            let end = pos + 1 + digits.len() + 1;
            return Some((pattern[..pos].to_string(), padding, pattern[end..].to_string()));
        }
        search = pos + 1;
    }

    None
}

/// Collect frame numbers of files matching `mask` that share prefix/suffix
fn glob_numbers(mask: &str, prefix: &str, suffix: &str) -> Result<BTreeSet<usize>, FrameError> {
    let entries = glob::glob(mask)
        .map_err(|e| FrameError::InvalidConfig(format!("Glob error for pattern {}: {}", mask, e)))?;

    // glob drops a leading "./" from its results, so compare file names only
    // when the directory part is fixed
    let by_name = !suffix.contains(is_separator);
    let name_prefix = prefix.rsplit(is_separator).next().unwrap_or(prefix);

    let mut numbers = BTreeSet::new();
    for entry in entries {
        let path = entry.map_err(|e| FrameError::InvalidConfig(format!("Glob entry error: {}", e)))?;
        let s = if by_name {
            match path.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            }
        } else {
            path.to_string_lossy().into_owned()
        };
        let head = if by_name { name_prefix } else { prefix };
        let Some(middle) = s.strip_prefix(head).and_then(|r| r.strip_suffix(suffix)) else {
            continue;
        };
        if !middle.is_empty() && middle.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(n) = middle.parse::<usize>() {
                numbers.insert(n);
            }
        }
    }
    Ok(numbers)
}

fn is_separator(c: char) -> bool {
    c == '/' || c == std::path::MAIN_SEPARATOR
}

/// Split a sequence filename into (prefix, number, ext, padding)
///
/// Example: "/path/seq.0001.png" -> ("/path/seq.", 1, "png", 4)
fn split_sequence_path(path: &Path) -> Option<(String, usize, String, usize)> {
    let ext = path.extension().and_then(|s| s.to_str())?.to_string();
    let stem = path.file_stem().and_then(|s| s.to_str())?;

    // Find trailing digits in stem
    let mut digit_start = stem.len();
    for (i, ch) in stem.char_indices().rev() {
        if ch.is_ascii_digit() {
            digit_start = i;
        } else {
            break;
        }
    }

    if digit_start == stem.len() {
        // No trailing digits -> not a sequence frame
        return None;
    }

    let number_str = &stem[digit_start..];
    let number = number_str.parse::<usize>().ok()?;
    let prefix_local = &stem[..digit_start]; // e.g. "seq." or "seq_"
    let padding = number_str.len();

    // Build full prefix including parent directory
    let mut prefix = String::new();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        prefix.push_str(&parent.to_string_lossy());
        if !prefix.ends_with(std::path::MAIN_SEPARATOR) {
            prefix.push(std::path::MAIN_SEPARATOR);
        }
    }
    prefix.push_str(prefix_local);

    Some((prefix, number, ext, padding))
}

/// Convenience: pattern + frame count from either a pattern string or a sample frame path.
///
/// `frames = None` scans the disk for the contiguous run starting at `start`.
pub fn resolve_sequence(
    input: &str,
    start: Option<usize>,
    frames: Option<usize>,
) -> Result<(SequencePattern, usize), FrameError> {
    let pattern = match SequencePattern::parse(input, start.unwrap_or(1)) {
        Ok(p) => p,
        Err(_) => {
            let p = SequencePattern::from_sample_path(&PathBuf::from(input))?;
            match start {
                Some(s) => p.with_start(s),
                None => p,
            }
        }
    };

    let total = match frames {
        Some(n) => n,
        None => pattern.detect_range()?.1,
    };
    Ok((pattern, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_pattern() {
        let p = SequencePattern::parse("shots/a.####.png", 1).unwrap();
        assert_eq!(p.padding(), 4);
        assert_eq!(p.locate(1).as_str(), "shots/a.0001.png");
        assert_eq!(p.locate(120).as_str(), "shots/a.0120.png");
    }

    #[test]
    fn test_printf_pattern_with_start_offset() {
        let p = SequencePattern::parse("img_%05d.jpg", 1001).unwrap();
        assert_eq!(p.locate(1).as_str(), "img_01001.jpg");
        assert_eq!(p.locate(3).as_str(), "img_01003.jpg");

        let p = SequencePattern::parse("img_%d.jpg", 1).unwrap();
        assert_eq!(p.locate(42).as_str(), "img_42.jpg");
    }

    #[test]
    fn test_brace_pattern() {
        let p = SequencePattern::parse("https://cdn.example.com/seq/{}.webp", 1).unwrap();
        assert_eq!(p.locate(7).as_str(), "https://cdn.example.com/seq/7.webp");
    }

    #[test]
    fn test_percent_without_d_is_not_placeholder() {
        let p = SequencePattern::parse("100%/frame_%03d.png", 1).unwrap();
        assert_eq!(p.locate(5).as_str(), "100%/frame_005.png");
    }

    #[test]
    fn test_bad_patterns() {
        assert!(SequencePattern::parse("no_placeholder.png", 1).is_err());
        assert!(SequencePattern::parse("a.##.b.##.png", 1).is_err());
    }

    #[test]
    fn test_from_sample_path() {
        let sep = std::path::MAIN_SEPARATOR;
        let path = PathBuf::from("renders").join("shot_0010.png");
        let p = SequencePattern::from_sample_path(&path).unwrap();

        assert_eq!(p.start(), 10);
        assert_eq!(p.padding(), 4);
        assert_eq!(p.locate(1).as_str(), format!("renders{}shot_0010.png", sep));
        assert_eq!(p.locate(2).as_str(), format!("renders{}shot_0011.png", sep));

        assert!(SequencePattern::from_sample_path(Path::new("still.png")).is_err());
    }

    #[test]
    fn test_detect_range_stops_at_gap() {
        let dir = std::env::temp_dir().join(format!("flipbook_seq_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for n in [1, 2, 3, 5] {
            std::fs::write(dir.join(format!("f.{:03}.png", n)), b"x").unwrap();
        }
        std::fs::write(dir.join("f.abc.png"), b"x").unwrap();

        let pattern = format!("{}{}f.###.png", dir.display(), std::path::MAIN_SEPARATOR);
        let p = SequencePattern::parse(&pattern, 1).unwrap();
        assert_eq!(p.detect_range().unwrap(), (1, 3));

        let (p, total) = resolve_sequence(&pattern, None, None).unwrap();
        assert_eq!(total, 3);
        assert_eq!(p.start(), 1);

        assert!(p.clone().with_start(4).detect_range().is_err());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_dot_relative_paths() {
        let dir_name = format!("flipbook_rel_seq_{}", std::process::id());
        let dir = PathBuf::from(".").join(&dir_name);
        std::fs::create_dir_all(&dir).unwrap();
        for n in 1..=3 {
            std::fs::write(dir.join(format!("f.{:04}.png", n)), b"x").unwrap();
        }

        let sep = std::path::MAIN_SEPARATOR;
        let pattern = format!(".{sep}{dir_name}{sep}f.####.png");
        let from_pattern = resolve_sequence(&pattern, None, None);

        let sample = format!(".{sep}{dir_name}{sep}f.0001.png");
        let from_sample = resolve_sequence(&sample, None, None);

        std::fs::remove_dir_all(&dir).ok();

        let (p, total) = from_pattern.unwrap();
        assert_eq!(total, 3);
        assert_eq!(p.locate(3).as_str(), format!(".{sep}{dir_name}{sep}f.0003.png"));

        let (p, total) = from_sample.unwrap();
        assert_eq!(total, 3);
        assert_eq!(p.start(), 1);
    }
}
