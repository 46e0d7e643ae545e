//! Small extension traits on standard library types.

pub mod hash_map;

pub use hash_map::*;

/// Collects the results of a fallible mapping over a slice, stopping at the first error.
pub trait TryMapSlice<T> {
    fn try_map<U, E, F>(&self, f: F) -> Result<Vec<U>, E>
    where
        F: FnMut(&T) -> Result<U, E>;
}
impl<T> TryMapSlice<T> for [T] {
    fn try_map<U, E, F>(&self, f: F) -> Result<Vec<U>, E>
    where
        F: FnMut(&T) -> Result<U, E>,
    {
        self.iter().map(f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_map_stops_at_first_error() {
        let values = [1, 2, 3, 4];
        let mut seen = vec![];
        let result: Result<Vec<i32>, i32> = values.try_map(|v| {
            seen.push(*v);
            if *v == 2 {
                Err(*v)
            } else {
                Ok(v * 10)
            }
        });
        assert_eq!(Err(2), result);
        assert_eq!(vec![1, 2], seen);
    }
}
