//! Slice Registry
//!
//! Maps a canonical type identifier to the constructor of its slice. A Matter
//! can only hold (and only read back) slices whose tag is registered here.
//!
//! The registry travels inside [`MantleConfig`](crate::MantleConfig) and is
//! shared by every Matter an engine creates, so two engines can carry
//! different sets of custom types.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{MantleError, Result};

use super::{MatterValue, Slice, TypedSlice};

/// Builds an empty slice of the given width, height and depth
pub type SliceFactory = fn(usize, usize, usize) -> Box<dyn Slice>;

fn typed_factory<T: MatterValue>(width: usize, height: usize, depth: usize) -> Box<dyn Slice> {
    Box::new(TypedSlice::<T>::new(width, height, depth))
}

/// Type identifier → slice constructor
#[derive(Clone)]
pub struct SliceRegistry {
    factories: BTreeMap<&'static str, SliceFactory>,
}

impl SliceRegistry {
    /// A registry with no types at all
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Register `T` under `T::TAG`, replacing any previous registration
    pub fn register<T: MatterValue>(&mut self) -> &mut Self {
        if self.factories.insert(T::TAG, typed_factory::<T>).is_some() {
            tracing::debug!("Slice type '{}' registered twice, keeping the latest", T::TAG);
        }
        self
    }

    /// Builder-style [`SliceRegistry::register`]
    pub fn with<T: MatterValue>(mut self) -> Self {
        self.register::<T>();
        self
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    /// Fail with [`MantleError::UnknownType`] unless `T` is registered
    pub fn require<T: MatterValue>(&self) -> Result<()> {
        if self.is_registered(T::TAG) {
            Ok(())
        } else {
            Err(MantleError::UnknownType(T::TAG.to_string()))
        }
    }

    /// Construct an empty slice for `tag`
    pub fn create(&self, tag: &str, width: usize, height: usize, depth: usize) -> Result<Box<dyn Slice>> {
        self.factories
            .get(tag)
            .map(|factory| factory(width, height, depth))
            .ok_or_else(|| MantleError::UnknownType(tag.to_string()))
    }

    /// Registered tags in sorted order
    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }
}

impl Default for SliceRegistry {
    /// All built-in value types
    fn default() -> Self {
        Self::empty()
            .with::<i8>()
            .with::<i16>()
            .with::<i32>()
            .with::<i64>()
            .with::<f32>()
            .with::<f64>()
            .with::<bool>()
            .with::<String>()
    }
}

impl fmt::Debug for SliceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}
