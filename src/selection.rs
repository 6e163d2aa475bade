//! Frame selection from a frame source, driven by key presses.
//!
//! `Scanning -> Previewing -> {Accepted -> Scanning, Scanning}`, with
//! `Stopped` terminal. Space previews the detected corners of the current
//! frame, Enter accepts the previewed frame, Escape stops.

use std::io::BufRead;

use image::DynamicImage;
use log::info;

use crate::board::TargetGeometry;
use crate::data_loader::FrameSource;
use crate::detected_points::ImagePointSet;
use crate::detector::{DetectorOptions, detect_with_options};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    Enter,
    Escape,
    Other(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Scanning,
    Previewing,
    Accepted,
    Stopped,
}

impl SelectionState {
    /// Next state after `key`; `None` means no key was pressed.
    pub fn on_key(self, key: Option<Key>) -> SelectionState {
        use SelectionState::*;
        match (self, key) {
            (Stopped, _) => Stopped,
            (_, Some(Key::Escape)) => Stopped,
            (Scanning, Some(Key::Space)) => Previewing,
            (Scanning, _) => Scanning,
            (Previewing, Some(Key::Enter)) => Accepted,
            (Previewing, _) => Scanning,
            (Accepted, _) => Scanning,
        }
    }
}

/// Where key presses come from.
pub trait KeySource {
    /// Key pressed for the current frame; `None` if none was pressed.
    fn next_key(&mut self) -> Option<Key>;
}

/// A fixed list of key presses, one per prompt; stops once exhausted.
#[derive(Debug, Clone, Default)]
pub struct ScriptedKeys {
    keys: std::collections::VecDeque<Option<Key>>,
}

impl ScriptedKeys {
    pub fn new(keys: impl IntoIterator<Item = Option<Key>>) -> ScriptedKeys {
        ScriptedKeys {
            keys: keys.into_iter().collect(),
        }
    }
}

impl KeySource for ScriptedKeys {
    fn next_key(&mut self) -> Option<Key> {
        self.keys.pop_front().unwrap_or(Some(Key::Escape))
    }
}

/// Reads one key per line: `space`, `enter`, `esc`; an empty line is no key.
/// End of input stops the selection.
pub struct LineKeys<R: BufRead> {
    reader: R,
}

impl<R: BufRead> LineKeys<R> {
    pub fn new(reader: R) -> LineKeys<R> {
        LineKeys { reader }
    }
}

pub fn parse_key(line: &str) -> Option<Key> {
    match line.trim().to_ascii_lowercase().as_str() {
        "" => None,
        "space" => Some(Key::Space),
        "enter" | "return" => Some(Key::Enter),
        "esc" | "escape" | "q" => Some(Key::Escape),
        other => other.chars().next().map(Key::Other),
    }
}

impl<R: BufRead> KeySource for LineKeys<R> {
    fn next_key(&mut self) -> Option<Key> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) | Err(_) => Some(Key::Escape),
            // a bare space line is trimmed away by parse_key
            Ok(_) if line.trim_end_matches(['\r', '\n']) == " " => Some(Key::Space),
            Ok(_) => parse_key(&line),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SelectedFrame {
    /// Position in the frame source.
    pub index: usize,
    pub image: DynamicImage,
    /// Corners found while previewing, if any.
    pub corners: Option<ImagePointSet>,
}

pub struct FrameSelector {
    target: TargetGeometry,
    detector: DetectorOptions,
    select_all: bool,
    state: SelectionState,
}

impl FrameSelector {
    pub fn new(target: TargetGeometry, detector: DetectorOptions, select_all: bool) -> FrameSelector {
        FrameSelector {
            target,
            detector,
            select_all,
            state: SelectionState::Scanning,
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    /// Walks `frames` until they run out or the user stops.
    ///
    /// With `select_all` every frame is accepted and no key is read.
    pub fn run(
        &mut self,
        frames: &mut dyn FrameSource,
        keys: &mut dyn KeySource,
    ) -> Result<Vec<SelectedFrame>> {
        let mut selected = Vec::new();
        let mut index = 0;
        while self.state != SelectionState::Stopped {
            let Some(image) = frames.next_frame()? else {
                break;
            };
            if self.select_all {
                selected.push(SelectedFrame {
                    index,
                    image,
                    corners: None,
                });
                index += 1;
                continue;
            }

            self.state = self.state.on_key(keys.next_key());
            let mut corners = None;
            if self.state == SelectionState::Previewing {
                corners = detect_with_options(&image, &self.target, &self.detector);
                match &corners {
                    Some(c) => info!("frame {}: {} corners found", index, c.len()),
                    None => info!("frame {}: pattern not found", index),
                }
                self.state = self.state.on_key(keys.next_key());
            }
            if self.state == SelectionState::Accepted {
                info!("frame {} selected ({} so far)", index, selected.len() + 1);
                selected.push(SelectedFrame {
                    index,
                    image,
                    corners,
                });
                self.state = self.state.on_key(None);
            }
            index += 1;
        }
        self.state = SelectionState::Stopped;
        info!("total selected frames: {}", selected.len());
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Blank(usize);

    impl FrameSource for Blank {
        fn next_frame(&mut self) -> Result<Option<DynamicImage>> {
            if self.0 == 0 {
                return Ok(None);
            }
            self.0 -= 1;
            Ok(Some(DynamicImage::new_luma8(32, 32)))
        }
    }

    fn target() -> TargetGeometry {
        TargetGeometry::new(4, 3, 1.0).unwrap()
    }

    #[test]
    fn transitions() {
        use SelectionState::*;
        assert_eq!(Scanning.on_key(None), Scanning);
        assert_eq!(Scanning.on_key(Some(Key::Enter)), Scanning);
        assert_eq!(Scanning.on_key(Some(Key::Space)), Previewing);
        assert_eq!(Previewing.on_key(Some(Key::Enter)), Accepted);
        assert_eq!(Previewing.on_key(Some(Key::Other('x'))), Scanning);
        assert_eq!(Previewing.on_key(None), Scanning);
        assert_eq!(Accepted.on_key(None), Scanning);
        assert_eq!(Previewing.on_key(Some(Key::Escape)), Stopped);
        assert_eq!(Stopped.on_key(Some(Key::Space)), Stopped);
    }

    #[test]
    fn accepts_previewed_frames_until_escape() {
        let mut selector = FrameSelector::new(target(), DetectorOptions::default(), false);
        let mut keys = ScriptedKeys::new([
            None,                  // frame 0 skipped
            Some(Key::Space),      // frame 1 previewed
            Some(Key::Enter),      //   and accepted
            Some(Key::Space),      // frame 2 previewed
            Some(Key::Other('n')), //   and rejected
            Some(Key::Space),      // frame 3 previewed
            Some(Key::Enter),      //   and accepted
            Some(Key::Escape),     // stop at frame 4
        ]);
        let selected = selector.run(&mut Blank(10), &mut keys).unwrap();
        let indices: Vec<_> = selected.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![1, 3]);
        assert!(selected.iter().all(|f| f.corners.is_none()));
        assert_eq!(selector.state(), SelectionState::Stopped);
    }

    #[test]
    fn select_all_takes_every_frame() {
        let mut selector = FrameSelector::new(target(), DetectorOptions::default(), true);
        let mut keys = ScriptedKeys::default();
        let selected = selector.run(&mut Blank(4), &mut keys).unwrap();
        assert_eq!(selected.len(), 4);
    }

    #[test]
    fn line_keys() {
        let input = "\nspace\nenter\n \nesc\n";
        let mut keys = LineKeys::new(std::io::Cursor::new(input));
        assert_eq!(keys.next_key(), None);
        assert_eq!(keys.next_key(), Some(Key::Space));
        assert_eq!(keys.next_key(), Some(Key::Enter));
        assert_eq!(keys.next_key(), Some(Key::Space));
        assert_eq!(keys.next_key(), Some(Key::Escape));
        assert_eq!(keys.next_key(), Some(Key::Escape));
    }
}
