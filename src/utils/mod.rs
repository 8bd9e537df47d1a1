pub mod time;

/// Generate a url-safe random id, used for run and subscription ids.
pub fn longid() -> String {
    nanoid::nanoid!()
}
