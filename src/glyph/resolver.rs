use std::{
    path::PathBuf,
    sync::mpsc::{self, Receiver, TryRecvError},
    thread,
};

use tracing::{error, info};

use super::typeface::{Typeface, TypefaceError};

/// Where the active typeface comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FontSource {
    Builtin,
    File(PathBuf),
}

impl FontSource {
    pub fn from_config(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => FontSource::File(path),
            None => FontSource::Builtin,
        }
    }
}

enum FontState {
    Loading(Receiver<Result<Typeface, TypefaceError>>),
    Ready(Typeface),
    Failed,
}

/// Status of the typeface after a `poll`.
#[derive(Debug)]
pub enum FontPoll<'a> {
    Pending,
    Ready(&'a Typeface),
    Failed,
}

/// Loads a typeface once, off the simulation thread, and hands it over
/// through a channel that the owner polls between frames.
pub struct TypefaceResolver {
    source: FontSource,
    state: FontState,
}

impl TypefaceResolver {
    pub fn spawn(source: FontSource) -> Self {
        let (tx, rx) = mpsc::channel();
        let state = match &source {
            FontSource::Builtin => {
                // Receiver is still alive, so this send cannot fail.
                let _ = tx.send(Ok(Typeface::builtin_block()));
                FontState::Loading(rx)
            }
            FontSource::File(path) => {
                let path = path.clone();
                let spawned = thread::Builder::new()
                    .name("typeface-loader".to_string())
                    .spawn(move || {
                        let _ = tx.send(Typeface::load(&path));
                    });
                match spawned {
                    Ok(_) => FontState::Loading(rx),
                    Err(err) => {
                        error!(error = %err, "failed to spawn typeface loader");
                        FontState::Failed
                    }
                }
            }
        };
        Self { source, state }
    }

    pub fn poll(&mut self) -> FontPoll<'_> {
        if let FontState::Loading(rx) = &self.state {
            match rx.try_recv() {
                Ok(Ok(face)) => {
                    info!(
                        family = face.family(),
                        glyphs = face.glyph_count(),
                        source = ?self.source,
                        "typeface_ready"
                    );
                    self.state = FontState::Ready(face);
                }
                Ok(Err(err)) => {
                    error!(error = %err, source = ?self.source, "typeface load failed");
                    self.state = FontState::Failed;
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    error!(source = ?self.source, "typeface loader exited without a result");
                    self.state = FontState::Failed;
                }
            }
        }

        match &self.state {
            FontState::Loading(_) => FontPoll::Pending,
            FontState::Ready(face) => FontPoll::Ready(face),
            FontState::Failed => FontPoll::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::Write,
        time::{Duration, Instant},
    };

    use super::*;

    fn poll_until_settled(resolver: &mut TypefaceResolver) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match resolver.poll() {
                FontPoll::Ready(_) => return true,
                FontPoll::Failed => return false,
                FontPoll::Pending if Instant::now() > deadline => return false,
                FontPoll::Pending => thread::sleep(Duration::from_millis(5)),
            }
        }
    }

    mod poll {
        use super::*;

        #[test]
        fn builtin_face_is_ready_on_first_poll() {
            let mut resolver = TypefaceResolver::spawn(FontSource::Builtin);
            assert!(matches!(resolver.poll(), FontPoll::Ready(_)));
        }

        #[test]
        fn file_face_arrives_from_loader_thread() {
            let mut file = tempfile::NamedTempFile::new().expect("temp file");
            write!(
                file,
                r#"{{ "familyName": "Tiny", "resolution": 1000,
                     "boundingBox": {{ "yMin": 0, "yMax": 1000 }},
                     "glyphs": {{ "a": {{ "ha": 500, "o": "m 0 0 l 1 1" }} }} }}"#
            )
            .expect("write");
            let mut resolver =
                TypefaceResolver::spawn(FontSource::File(file.path().to_path_buf()));
            assert!(poll_until_settled(&mut resolver));
            match resolver.poll() {
                FontPoll::Ready(face) => assert_eq!(face.family(), "Tiny"),
                other => panic!("expected ready face, got {other:?}"),
            }
        }

        #[test]
        fn missing_file_fails_and_stays_failed() {
            let mut resolver =
                TypefaceResolver::spawn(FontSource::File(PathBuf::from("/no/such/face.json")));
            assert!(!poll_until_settled(&mut resolver));
            assert!(matches!(resolver.poll(), FontPoll::Failed));
        }
    }

    mod from_config {
        use super::*;

        #[test]
        fn none_means_builtin() {
            assert_eq!(FontSource::from_config(None), FontSource::Builtin);
            assert_eq!(
                FontSource::from_config(Some(PathBuf::from("a.json"))),
                FontSource::File(PathBuf::from("a.json"))
            );
        }
    }
}
