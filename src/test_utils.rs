pub mod test_helpers {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};
    use std::time::Duration;

    use crate::preview::{
        Bitmap, ContainerState, CursorPosition, DocumentSize, HostElement, ListenerId,
        ListenerKind, RasterScene, RenderMode, RenderSession, SessionError, Tile, VectorParams,
    };

    /// Everything a [`RecordingHost`] has been asked to do
    #[derive(Debug, Default)]
    pub struct HostRecord {
        pub container: ContainerState,
        pub scroll: (f64, f64),
        pub listeners: Vec<(ListenerId, ListenerKind)>,
        pub removed_listeners: Vec<ListenerId>,
        pub markup: Vec<String>,
        pub transforms: Vec<f32>,
        pub buffer_sizes: Vec<(u32, u32)>,
        pub blits: Vec<Bitmap>,
        pub source_hook_installs: usize,
        pub cursors: Vec<Option<CursorPosition>>,
        pub page_indicators: Vec<usize>,
        next_listener: u64,
    }

    /// Host element that records every call for later inspection
    pub struct RecordingHost {
        record: Rc<RefCell<HostRecord>>,
        supported: Vec<RenderMode>,
    }

    impl RecordingHost {
        /// Create a host and a handle to its record
        pub fn new(container: ContainerState) -> (Self, Rc<RefCell<HostRecord>>) {
            let record = Rc::new(RefCell::new(HostRecord {
                container,
                ..HostRecord::default()
            }));
            let host = Self {
                record: record.clone(),
                supported: vec![RenderMode::Vector, RenderMode::Raster],
            };
            (host, record)
        }

        /// Restrict the modes this host claims to support
        pub fn supporting(mut self, modes: &[RenderMode]) -> Self {
            self.supported = modes.to_vec();
            self
        }
    }

    impl HostElement for RecordingHost {
        fn container_state(&self) -> ContainerState {
            self.record.borrow().container
        }

        fn scroll_position(&self) -> (f64, f64) {
            self.record.borrow().scroll
        }

        fn set_scroll_position(&mut self, x: f64, y: f64) {
            self.record.borrow_mut().scroll = (x, y);
        }

        fn supports(&self, mode: RenderMode) -> bool {
            self.supported.contains(&mode)
        }

        fn add_listener(&mut self, kind: ListenerKind) -> ListenerId {
            let mut record = self.record.borrow_mut();
            record.next_listener += 1;
            let id = ListenerId(record.next_listener);
            record.listeners.push((id, kind));
            id
        }

        fn remove_listener(&mut self, id: ListenerId) {
            let mut record = self.record.borrow_mut();
            record.listeners.retain(|(l, _)| *l != id);
            record.removed_listeners.push(id);
        }

        fn replace_markup(&mut self, markup: String) {
            self.record.borrow_mut().markup.push(markup);
        }

        fn set_transform(&mut self, scale: f32) {
            self.record.borrow_mut().transforms.push(scale);
        }

        fn resize_pixel_buffer(&mut self, width: u32, height: u32) {
            self.record.borrow_mut().buffer_sizes.push((width, height));
        }

        fn blit(&mut self, bitmap: &Bitmap) {
            self.record.borrow_mut().blits.push(bitmap.clone());
        }

        fn install_source_hooks(&mut self) {
            self.record.borrow_mut().source_hook_installs += 1;
        }

        fn show_cursor(&mut self, cursor: Option<CursorPosition>) {
            self.record.borrow_mut().cursors.push(cursor);
        }

        fn set_page_indicator(&mut self, page_count: usize) {
            self.record.borrow_mut().page_indicators.push(page_count);
        }
    }

    /// Calls seen by a [`ScriptedSession`]
    #[derive(Debug, Default)]
    pub struct SessionRecord {
        pub merges: Vec<Vec<u8>>,
        pub resets: usize,
        pub vector_renders: Vec<VectorParams>,
        pub scenes_created: usize,
    }

    /// Log of tiles drawn by scenes, tagged with the scene's revision
    pub type TileLog = Arc<Mutex<Vec<(u64, u32)>>>;

    /// Session with a fixed document size that rejects payloads starting
    /// with `b"bad"`
    pub struct ScriptedSession {
        record: Rc<RefCell<SessionRecord>>,
        size: DocumentSize,
        pages: Rc<Cell<usize>>,
        loaded: bool,
        revision: u64,
        tile_delay: Duration,
        tiles: TileLog,
        fail_renders: Arc<AtomicBool>,
    }

    impl ScriptedSession {
        pub fn new(size: DocumentSize, pages: usize) -> (Self, Rc<RefCell<SessionRecord>>) {
            let record = Rc::new(RefCell::new(SessionRecord::default()));
            let session = Self {
                record: record.clone(),
                size,
                pages: Rc::new(Cell::new(pages)),
                loaded: false,
                revision: 0,
                tile_delay: Duration::ZERO,
                tiles: TileLog::default(),
                fail_renders: Arc::default(),
            };
            (session, record)
        }

        /// Slow down every raster tile
        pub fn with_tile_delay(mut self, delay: Duration) -> Self {
            self.tile_delay = delay;
            self
        }

        /// Shared log of tiles drawn by this session's scenes
        pub fn tile_log(&self) -> TileLog {
            self.tiles.clone()
        }

        /// Page count reported after a merge; changes apply from the next call
        pub fn pages_handle(&self) -> Rc<Cell<usize>> {
            self.pages.clone()
        }

        /// While set, vector renders fail and scenes fail on their first tile
        pub fn render_failures(&self) -> Arc<AtomicBool> {
            self.fail_renders.clone()
        }
    }

    impl RenderSession for ScriptedSession {
        fn merge(&mut self, payload: &[u8]) -> Result<(), SessionError> {
            if payload.starts_with(b"bad") {
                return Err(SessionError::Malformed("scripted rejection".to_string()));
            }
            self.record.borrow_mut().merges.push(payload.to_vec());
            self.loaded = true;
            self.revision += 1;
            Ok(())
        }

        fn reset(&mut self) {
            self.record.borrow_mut().resets += 1;
            self.loaded = false;
        }

        fn page_count(&self) -> usize {
            if self.loaded { self.pages.get() } else { 0 }
        }

        fn document_size(&self) -> Option<DocumentSize> {
            self.loaded.then_some(self.size)
        }

        fn render_vector(&self, params: &VectorParams) -> Result<String, SessionError> {
            if !self.loaded {
                return Err(SessionError::Empty);
            }
            if self.fail_renders.load(Ordering::Acquire) {
                return Err(SessionError::generic("scripted render failure"));
            }
            self.record.borrow_mut().vector_renders.push(params.clone());
            Ok(format!(
                "<svg data-revision=\"{}\" width=\"{}\" height=\"{}\"></svg>",
                self.revision, self.size.width, self.size.height
            ))
        }

        fn raster_scene(&self) -> Result<Arc<dyn RasterScene>, SessionError> {
            if !self.loaded {
                return Err(SessionError::Empty);
            }
            self.record.borrow_mut().scenes_created += 1;
            Ok(Arc::new(SlowScene {
                size: self.size,
                revision: self.revision,
                delay: self.tile_delay,
                log: self.tiles.clone(),
                fail: self.fail_renders.load(Ordering::Acquire),
            }))
        }
    }

    /// Scene that sleeps per tile and paints the low byte of its revision
    pub struct SlowScene {
        pub size: DocumentSize,
        pub revision: u64,
        pub delay: Duration,
        pub log: TileLog,
        /// Fail every tile instead of painting it
        pub fail: bool,
    }

    impl RasterScene for SlowScene {
        fn size(&self) -> DocumentSize {
            self.size
        }

        fn render_tile(&self, tile: &Tile, _scale: f32, out: &mut [u8]) -> Result<(), SessionError> {
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            if self.fail {
                return Err(SessionError::generic("scripted tile failure"));
            }
            out.fill(self.revision as u8);
            self.log
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((self.revision, tile.y));
            Ok(())
        }
    }
}
