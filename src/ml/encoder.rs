use crate::error::{ProcessingError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Maps each distinct class to a dense index, in sorted class order.
///
/// Transforming a class that was absent at fit time is an error; there is no
/// fallback index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder<T> {
    name: String,
    classes: Vec<T>,
}

impl<T> LabelEncoder<T>
where
    T: Ord + Clone + Display,
{
    pub fn fit<I>(name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let mut classes: Vec<T> = values.into_iter().collect();
        classes.sort();
        classes.dedup();

        Self {
            name: name.to_string(),
            classes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn classes(&self) -> &[T] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.classes.binary_search(value).is_ok()
    }

    pub fn transform(&self, value: &T) -> Result<usize> {
        self.classes
            .binary_search(value)
            .map_err(|_| ProcessingError::UnknownCategory {
                encoder: self.name.clone(),
                value: value.to_string(),
            })
    }

    pub fn transform_all<'a, I>(&self, values: I) -> Result<Vec<usize>>
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        values.into_iter().map(|v| self.transform(v)).collect()
    }

    pub fn inverse_transform(&self, index: usize) -> Result<T> {
        self.classes.get(index).cloned().ok_or_else(|| {
            ProcessingError::Model(format!(
                "{} encoder has {} classes, index {} is out of range",
                self.name,
                self.classes.len(),
                index
            ))
        })
    }
}
