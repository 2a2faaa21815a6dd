//! Pipeline stages for LaTeX-to-DOCX chapter conversion.
//!
//! Each submodule implements exactly one transformation step so that each
//! can be tested on its own and the compiler can be swapped without touching
//! the text stages.
//!
//! ## Data Flow
//!
//! ```text
//! discover ──▶ normalize ──▶ assemble ──▶ compile ──▶ (style)
//! (files)      (per section)  (chapter)    (pandoc)
//!                  │
//!                  ├── images        graphic path → file on disk
//!                  └── bibliography  chapter-wide reference list
//! ```
//!
//! 1. [`discover`]  — find the file holding each section number
//! 2. [`normalize`] — ordered text rewrite rules over one section; uses
//!    [`images`] to resolve figures and [`bibliography`] to collect
//!    references. [`scan`] is the small LaTeX scanner underneath both.
//! 3. [`assemble`]  — title page + sections + bibliography, output naming
//! 4. [`compile`]   — run the external document compiler
//!
//! Restyling of the compiled document lives in [`crate::style`].

pub mod assemble;
pub mod bibliography;
pub mod compile;
pub mod discover;
pub mod images;
pub mod normalize;
pub mod scan;
