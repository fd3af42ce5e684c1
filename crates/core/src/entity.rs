/// A catalog row addressed by a typed id.
///
/// Ids are small `Copy` values, used as map keys in memory and as the suffix of
/// counter keys.
pub trait Entity {
    type Id: Copy + Ord + core::fmt::Display;

    fn id(&self) -> Self::Id;
}
