use core::{
	borrow::Borrow,
	hash::{BuildHasher, Hash},
};
use hashbrown::{
	hash_map::{DefaultHashBuilder, Entry},
	HashMap,
};
use num_traits::{CheckedAdd, CheckedSub, One, Zero};

/// A map of values that are shared by several users, each counted.
///
/// Entries whose count drops to zero stay in the map until [`RcHashMap::drain_weak`] collects them,
/// so a value that is released and immediately reacquired during one patch is not recreated.
#[derive(Debug)]
pub struct RcHashMap<K, C, V, S = DefaultHashBuilder>(HashMap<K, (C, V), S>)
where
	K: Hash + Eq,
	C: CheckedAdd + CheckedSub + One + Zero,
	S: BuildHasher;
impl<K, C, V, S> Default for RcHashMap<K, C, V, S>
where
	K: Hash + Eq,
	C: CheckedAdd + CheckedSub + One + Zero,
	S: Default + BuildHasher,
{
	fn default() -> Self {
		Self::new()
	}
}
impl<K, C, V, S> RcHashMap<K, C, V, S>
where
	K: Hash + Eq,
	C: CheckedAdd + CheckedSub + One + Zero,
	S: BuildHasher,
{
	#[must_use]
	pub fn new() -> Self
	where
		S: Default,
	{
		Self(HashMap::with_hasher(S::default()))
	}

	pub fn increment_or_insert_with<F: FnOnce(&K) -> V>(&mut self, k: K, v: F) -> Result<&mut V, CountSaturatedError> {
		match self.0.entry(k) {
			Entry::Occupied(occupied) => {
				let (c, v) = occupied.into_mut();
				*c = c.checked_add(&C::one()).ok_or(CountSaturatedError)?;
				Ok(v)
			}
			Entry::Vacant(vacant) => {
				let v = v(vacant.key());
				let (_, v) = vacant.insert((C::one(), v));
				Ok(v)
			}
		}
	}

	/// Decrements the count of `k` without removing it.
	///
	/// # Errors
	///
	/// Iff the count is already zero.
	pub fn weak_decrement<Q: ?Sized>(&mut self, k: &Q) -> Result<Option<&mut V>, CountSaturatedError>
	where
		K: Borrow<Q>,
		Q: Eq + Hash,
	{
		match self.0.get_mut(k) {
			Some((c, v)) => {
				*c = c.checked_sub(&C::one()).ok_or(CountSaturatedError)?;
				Ok(Some(v))
			}
			None => Ok(None),
		}
	}

	/// Removes and yields all entries with a count of zero.
	pub fn drain_weak(&mut self) -> impl Iterator<Item = (K, V)> + '_ {
		self.0.extract_if(|_, (c, _)| c.is_zero()).map(|(k, (_, v))| (k, v))
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountSaturatedError;
