use super::{Design, DesignError, SliceId};

/// Single bit or stepped range of a parent
///
/// Negative values count from the end of the parent. Range bounds
/// are inclusive at `start` and exclusive at `stop`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SliceIndex {
	Index(isize),
	Range {
		start: Option<isize>,
		stop: Option<isize>,
		step: Option<isize>,
	},
}

impl SliceIndex {
	/// Unit-step range `[start:stop]`
	pub fn range(start: isize, stop: isize) -> Self {
		SliceIndex::Range {
			start: Some(start),
			stop: Some(stop),
			step: None,
		}
	}

	/// Full range with the given step, `[::step]`
	pub fn stepped(step: isize) -> Self {
		SliceIndex::Range {
			start: None,
			stop: None,
			step: Some(step),
		}
	}

	/// Resolves the index against a parent of `width` bits
	pub fn bounds(&self, width: usize) -> Result<SliceBounds, DesignError> {
		let w = width as isize;
		match *self {
			SliceIndex::Index(index) => {
				let norm = if index < 0 { index + w } else { index };
				if norm < 0 || norm >= w {
					return Err(DesignError::SliceIndexOutOfRange { index, width });
				}
				Ok(SliceBounds {
					start: norm as usize,
					step: 1,
					width: 1,
				})
			},

			SliceIndex::Range { start, stop, step } => {
				let step = step.unwrap_or(1);
				if step == 0 {
					return Err(DesignError::ZeroSliceStep);
				}
				let norm = |v: isize| if v < 0 { v + w } else { v };
				let (first, end) = if step > 0 {
					(start.map_or(0, norm), stop.map_or(w, norm))
				}
				else {
					(start.map_or(w - 1, norm), stop.map_or(-1, norm))
				};

				let invalid = DesignError::InvalidSliceRange {
					start: first,
					stop: end,
					step,
					width,
				};
				let span = if step > 0 {
					if first < 0 || end > w || first >= end {
						return Err(invalid);
					}
					end - first
				}
				else {
					if first >= w || end < -1 || first <= end {
						return Err(invalid);
					}
					first - end
				};

				let stride = step.abs();
				Ok(SliceBounds {
					start: first as usize,
					step,
					width: ((span + stride - 1) / stride) as usize,
				})
			},
		}
	}
}

/// Resolved slice: the bits `start, start + step, ...` of the parent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliceBounds {
	pub start: usize,
	pub step: isize,
	pub width: usize,
}

impl SliceBounds {
	/// Parent bit index of the `k`-th selected element
	pub fn bit(&self, k: usize) -> usize {
		(self.start as isize + self.step * k as isize) as usize
	}

	/// Lowest parent bit selected
	pub fn bot(&self) -> usize {
		if self.step > 0 {
			self.start
		}
		else {
			self.bit(self.width - 1)
		}
	}

	/// One past the highest parent bit selected
	pub fn top(&self) -> usize {
		if self.step > 0 {
			self.bit(self.width - 1) + 1
		}
		else {
			self.start + 1
		}
	}

	/// Checks if this selects a contiguous ascending run of bits
	pub fn is_contiguous(&self) -> bool {
		self.step == 1 || self.width == 1
	}

	pub fn bits(&self) -> impl Iterator<Item = usize> + '_ {
		(0..self.width).map(|k| self.bit(k))
	}
}

impl Design {
	/// Returns the bounds of a slice, computing them on first use
	pub fn slice_bounds(&self, id: SliceId) -> Result<SliceBounds, DesignError> {
		let entry = self.slice_entry(id);
		if let Some(bounds) = entry.bounds.get() {
			return Ok(*bounds);
		}
		let parent_width = self.width(entry.parent)?;
		let bounds = entry.index.bounds(parent_width)?;
		let _ = entry.bounds.set(bounds);
		Ok(bounds)
	}
}
