//! Everything that happens to the image and the PSF before an algorithm sees
//! them, plus the per-iteration constraint projection.

mod apodization;
mod constraint;
mod padding;
mod psf;

pub use apodization::Apodization;
pub use constraint::Constraint;
pub use padding::{Boundary, PadSize, Padding};
pub use psf::{center_of_mass, gaussian, resize_centered, PsfCenter, PsfPreparation};
