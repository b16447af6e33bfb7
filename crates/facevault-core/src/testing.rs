//! In-process fakes for the detector, embedder and store capabilities.

use crate::detector::{DetectionMode, DetectorError, FaceDetector};
use crate::encoder::{EmbedderError, FaceEmbedder};
use crate::store::{PersonStore, StoreConnection, StoreError, StoreTarget};
use crate::types::{FaceEncoding, FaceRegion, PersonRecord, ENCODING_DIM};
use image::RgbImage;
use std::cell::RefCell;
use std::rc::Rc;

/// A 10×10 region whose `x` doubles as a tag the fake embedder copies into
/// the first encoding value.
pub(crate) fn region_at(x: f32) -> FaceRegion {
    FaceRegion {
        x,
        y: 0.0,
        width: 10.0,
        height: 10.0,
        confidence: 0.9,
        landmarks: None,
    }
}

enum DetectorBehaviour {
    Regions(Vec<FaceRegion>),
    Fail,
    Panic,
}

pub(crate) struct FakeDetector {
    behaviour: DetectorBehaviour,
    pub modes: Vec<DetectionMode>,
}

impl FakeDetector {
    pub fn with_regions(regions: Vec<FaceRegion>) -> Self {
        Self {
            behaviour: DetectorBehaviour::Regions(regions),
            modes: Vec::new(),
        }
    }

    pub fn failing() -> Self {
        Self {
            behaviour: DetectorBehaviour::Fail,
            modes: Vec::new(),
        }
    }

    pub fn panicking() -> Self {
        Self {
            behaviour: DetectorBehaviour::Panic,
            modes: Vec::new(),
        }
    }
}

impl FaceDetector for FakeDetector {
    fn detect_regions(
        &mut self,
        _image: &RgbImage,
        mode: DetectionMode,
    ) -> Result<Vec<FaceRegion>, DetectorError> {
        self.modes.push(mode);
        match &self.behaviour {
            DetectorBehaviour::Regions(regions) => Ok(regions.clone()),
            DetectorBehaviour::Fail => {
                Err(DetectorError::InferenceFailed("fake failure".into()))
            }
            DetectorBehaviour::Panic => panic!("fake detector panic"),
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeEmbedder {
    refuse: bool,
    pub calls: usize,
    pub regions_seen: Vec<usize>,
}

impl FakeEmbedder {
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }
}

impl FaceEmbedder for FakeEmbedder {
    fn compute_embeddings(
        &mut self,
        _image: &RgbImage,
        regions: &[FaceRegion],
    ) -> Result<Vec<Option<FaceEncoding>>, EmbedderError> {
        self.calls += 1;
        self.regions_seen.push(regions.len());
        Ok(regions
            .iter()
            .map(|region| {
                if self.refuse {
                    return None;
                }
                let mut values = vec![0.01; ENCODING_DIM];
                values[0] = region.x;
                FaceEncoding::new(values, Some("fake".into())).ok()
            })
            .collect())
    }
}

#[derive(Default)]
struct StoreState {
    records: Vec<PersonRecord>,
    opens: usize,
    closes: usize,
}

/// Store kept in memory; connections share state with the store.
#[derive(Default)]
pub(crate) struct MemoryStore {
    state: Rc<RefCell<StoreState>>,
    reject_writes: bool,
    fail_close: bool,
}

impl MemoryStore {
    pub fn rejecting_writes() -> Self {
        Self {
            reject_writes: true,
            ..Self::default()
        }
    }

    pub fn failing_close() -> Self {
        Self {
            fail_close: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<PersonRecord> {
        self.state.borrow().records.clone()
    }

    pub fn opens(&self) -> usize {
        self.state.borrow().opens
    }

    pub fn closes(&self) -> usize {
        self.state.borrow().closes
    }
}

pub(crate) struct MemoryConnection {
    state: Rc<RefCell<StoreState>>,
    reject_writes: bool,
    fail_close: bool,
}

impl PersonStore for MemoryStore {
    type Connection = MemoryConnection;

    fn open(&self, _target: &StoreTarget) -> Result<MemoryConnection, StoreError> {
        self.state.borrow_mut().opens += 1;
        Ok(MemoryConnection {
            state: Rc::clone(&self.state),
            reject_writes: self.reject_writes,
            fail_close: self.fail_close,
        })
    }
}

impl StoreConnection for MemoryConnection {
    fn write(&mut self, record: &PersonRecord) -> Result<(), StoreError> {
        if self.reject_writes {
            return Err(StoreError::Write("fake rejection".into()));
        }
        self.state.borrow_mut().records.push(record.clone());
        Ok(())
    }

    fn close(self) -> Result<(), StoreError> {
        self.state.borrow_mut().closes += 1;
        if self.fail_close {
            return Err(StoreError::Close("fake close failure".into()));
        }
        Ok(())
    }
}
