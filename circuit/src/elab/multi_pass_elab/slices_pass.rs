use log::trace;

use crate::design::{ConcatId, Connectable, Design, DesignError, ModuleId, SignalId, SliceId};
use crate::elab::{ElabError, ElabErrorKind};

use super::{ElabCtx, ElabPass};

/// Run of adjacent bits of one signal, or a piece that cannot be merged
enum Piece {
	Bits { sig: SignalId, lo: usize, hi: usize },
	Other(Connectable),
}

/// Lowers nested slices and concatenations
///
/// Afterwards connections are signals, contiguous slices of signals,
/// or flat concatenations of those.
pub(super) struct ResolveSlicesPass;

impl ResolveSlicesPass {
	fn resolve(design: &mut Design, conn: Connectable) -> Result<Connectable, ElabErrorKind> {
		match conn {
			Connectable::Slice(id) => Self::resolve_slice(design, id),
			Connectable::Concat(id) => Self::resolve_concat(design, id),
			Connectable::PortRef(id) => match design.port_ref_entry(id).resolved {
				Some(resolved) => Self::resolve(design, resolved),
				None => Err(ElabErrorKind::UnresolvedReference(format!(
					"PortRef `{}`",
					design.port_ref_entry(id).portname
				))),
			},
			Connectable::BundleRef(id) => match design.bundle_ref_entry(id).resolved {
				Some(resolved) => Self::resolve(design, resolved),
				None => Err(ElabErrorKind::UnresolvedReference(format!(
					"BundleRef `{}`",
					design.bundle_ref_entry(id).attr
				))),
			},
			_ => Ok(conn),
		}
	}

	fn resolve_slice(design: &mut Design, id: SliceId) -> Result<Connectable, ElabErrorKind> {
		let bounds = design.slice_bounds(id)?;
		let old_parent = design.slice_entry(id).parent;
		let parent = Self::resolve(design, old_parent)?;
		if bounds.step == 1 && bounds.width == design.width(parent)? {
			return Ok(parent);
		}

		match parent {
			Connectable::Signal(_) if bounds.is_contiguous() => {
				if parent != old_parent {
					design.set_slice_parent(id, parent);
				}
				Ok(Connectable::Slice(id))
			},
			Connectable::Slice(inner) if bounds.width == 1 => {
				let grandparent = design.slice_entry(inner).parent;
				let bit = design.slice_bounds(inner)?.bit(bounds.start);
				let composed = design.index(grandparent, bit as isize)?;
				Self::resolve(design, composed.into())
			},
			Connectable::Concat(inner) if bounds.width == 1 => {
				let parts = design.concat_entry(inner).parts.clone();
				let mut offset = 0;
				for part in parts {
					let width = design.width(part)?;
					if bounds.start < offset + width {
						let bit = design.index(part, (bounds.start - offset) as isize)?;
						return Self::resolve(design, bit.into());
					}
					offset += width;
				}
				Err(DesignError::SliceIndexOutOfRange {
					index: bounds.start as isize,
					width: offset,
				}
				.into())
			},
			_ => {
				let mut pieces = Vec::with_capacity(bounds.width);
				for k in 0..bounds.width {
					let bit = design.index(parent, bounds.bit(k) as isize)?;
					pieces.push(Self::resolve(design, bit.into())?);
				}
				Self::merge(design, pieces)
			},
		}
	}

	/// Single bit of a signal that `conn` stands for, if any
	fn unit_bit(design: &Design, conn: Connectable) -> Option<(SignalId, usize)> {
		match conn {
			Connectable::Signal(sig) if design.signal(sig).signal.width == 1 => Some((sig, 0)),
			Connectable::Slice(id) => match design.slice_entry(id).parent {
				Connectable::Signal(sig) => design
					.slice_bounds(id)
					.ok()
					.filter(|b| b.width == 1)
					.map(|b| (sig, b.start)),
				_ => None,
			},
			_ => None,
		}
	}

	/// Joins single-bit pieces, least significant first, merging ascending runs
	fn merge(design: &mut Design, pieces: Vec<Connectable>) -> Result<Connectable, ElabErrorKind> {
		let mut runs: Vec<Piece> = vec![];
		for piece in pieces {
			let unit = Self::unit_bit(design, piece);
			if let (Some((sig, bit)), Some(Piece::Bits { sig: last, hi, .. })) = (unit, runs.last_mut()) {
				if *last == sig && *hi == bit {
					*hi += 1;
					continue;
				}
			}
			match unit {
				Some((sig, bit)) => runs.push(Piece::Bits {
					sig,
					lo: bit,
					hi: bit + 1,
				}),
				None => runs.push(Piece::Other(piece)),
			}
		}

		let mut parts = Vec::with_capacity(runs.len());
		for run in runs {
			parts.push(match run {
				Piece::Bits { sig, lo, hi } if lo == 0 && hi == design.signal(sig).signal.width => sig.into(),
				Piece::Bits { sig, lo, hi } => design.range(sig, lo as isize, hi as isize)?.into(),
				Piece::Other(conn) => conn,
			});
		}

		match parts.as_slice() {
			[single] => Ok(*single),
			_ => Ok(design.concat(parts)?.into()),
		}
	}

	fn resolve_concat(design: &mut Design, id: ConcatId) -> Result<Connectable, ElabErrorKind> {
		let parts = design.concat_entry(id).parts.clone();
		if parts.is_empty() {
			return Err(DesignError::EmptyConcat.into());
		}

		let mut flat = Vec::with_capacity(parts.len());
		for part in &parts {
			match Self::resolve(design, *part)? {
				Connectable::Concat(inner) => flat.extend(design.concat_entry(inner).parts.iter().copied()),
				resolved => flat.push(resolved),
			}
		}

		if let [single] = flat.as_slice() {
			return Ok(*single);
		}
		if flat != parts {
			design.set_concat_parts(id, flat);
		}
		Ok(Connectable::Concat(id))
	}
}

impl ElabPass for ResolveSlicesPass {
	fn name(&self) -> &'static str {
		"ResolveSlices"
	}

	fn elaborate_module(&mut self, ctx: &mut ElabCtx, module: ModuleId) -> Result<(), ElabError> {
		for inst in ctx.design.all_instances(module) {
			let conns: Vec<(String, Connectable)> =
				ctx.design.instance(inst).conns.iter().map(|(p, c)| (p.clone(), *c)).collect();
			for (port, conn) in conns {
				let resolved = Self::resolve(ctx.design, conn).map_err(|k| ctx.fail(k))?;
				if resolved != conn {
					trace!("Connecting {}.{} to {:?}", ctx.design.instance(inst).name, port, resolved);
					ctx.design.instance_mut(inst).conns.insert(port, resolved);
				}
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::design::{SliceBounds, SliceIndex, Signal};

	fn design_with(widths: &[(&str, usize)]) -> Result<(Design, Vec<SignalId>), DesignError> {
		let mut d = Design::new();
		let m = d.new_module("m")?;
		let mut sigs = vec![];
		for (name, width) in widths {
			sigs.push(d.add_signal(m, Signal::new(name, *width))?);
		}
		Ok((d, sigs))
	}

	fn slice_of(d: &Design, conn: Connectable) -> (Connectable, SliceBounds) {
		let Connectable::Slice(id) = conn
		else {
			panic!("expected a slice, got {:?}", conn);
		};
		(d.slice_entry(id).parent, d.slice_bounds(id).unwrap())
	}

	#[test]
	fn test_unit_slice_of_slice_composes() -> Result<(), ElabErrorKind> {
		let (mut d, sigs) = design_with(&[("sig", 4)])?;
		let low = d.range(sigs[0], 0, 2)?;
		let nested = d.index(low, 1)?;
		let direct = d.index(sigs[0], 1)?;

		let resolved = ResolveSlicesPass::resolve(&mut d, nested.into())?;
		assert_eq!(slice_of(&d, resolved), slice_of(&d, direct.into()));
		Ok(())
	}

	#[test]
	fn test_full_slice_collapses() -> Result<(), ElabErrorKind> {
		let (mut d, sigs) = design_with(&[("sig", 4)])?;
		let full = d.range(sigs[0], 0, 4)?;
		let nested = d.slice(full, SliceIndex::range(0, 4))?;
		assert_eq!(ResolveSlicesPass::resolve(&mut d, nested.into())?, Connectable::Signal(sigs[0]));

		let contiguous = d.range(sigs[0], 1, 3)?;
		assert_eq!(ResolveSlicesPass::resolve(&mut d, contiguous.into())?, Connectable::Slice(contiguous));
		Ok(())
	}

	#[test]
	fn test_reversed_slice_is_peeled() -> Result<(), ElabErrorKind> {
		let (mut d, sigs) = design_with(&[("sig", 3)])?;
		let rev = d.slice(sigs[0], SliceIndex::stepped(-1))?;
		let resolved = ResolveSlicesPass::resolve(&mut d, rev.into())?;
		let Connectable::Concat(c) = resolved
		else {
			panic!("expected a concatenation");
		};
		let starts: Vec<usize> = d
			.concat_entry(c)
			.parts
			.clone()
			.into_iter()
			.map(|p| slice_of(&d, p).1.start)
			.collect();
		assert_eq!(starts, vec![2, 1, 0]);
		assert_eq!(d.width(resolved)?, 3);
		Ok(())
	}

	#[test]
	fn test_slice_of_concat_merges_runs() -> Result<(), ElabErrorKind> {
		let (mut d, sigs) = design_with(&[("a", 4), ("b", 4)])?;
		let cat = d.concat(vec![sigs[0].into(), sigs[1].into()])?;
		let mid = d.range(cat, 2, 6)?;

		let resolved = ResolveSlicesPass::resolve(&mut d, mid.into())?;
		let Connectable::Concat(c) = resolved
		else {
			panic!("expected a concatenation");
		};
		let parts = d.concat_entry(c).parts.clone();
		assert_eq!(parts.len(), 2);
		let (a_parent, a_bounds) = slice_of(&d, parts[0]);
		let (b_parent, b_bounds) = slice_of(&d, parts[1]);
		assert_eq!(a_parent, Connectable::Signal(sigs[0]));
		assert_eq!((a_bounds.bot(), a_bounds.top()), (2, 4));
		assert_eq!(b_parent, Connectable::Signal(sigs[1]));
		assert_eq!((b_bounds.bot(), b_bounds.top()), (0, 2));
		Ok(())
	}

	#[test]
	fn test_nested_concats_flattened() -> Result<(), ElabErrorKind> {
		let (mut d, sigs) = design_with(&[("a", 1), ("b", 2), ("c", 3)])?;
		let inner = d.concat(vec![sigs[1].into(), sigs[2].into()])?;
		let outer = d.concat(vec![sigs[0].into(), inner.into()])?;
		let resolved = ResolveSlicesPass::resolve(&mut d, outer.into())?;
		assert_eq!(resolved, Connectable::Concat(outer));
		let expected: Vec<Connectable> = sigs.iter().map(|s| Connectable::Signal(*s)).collect();
		assert_eq!(d.concat_entry(outer).parts, expected);

		let empty = d.concat(vec![])?;
		assert!(matches!(
			ResolveSlicesPass::resolve(&mut d, empty.into()),
			Err(ElabErrorKind::Design(DesignError::EmptyConcat))
		));
		Ok(())
	}
}
