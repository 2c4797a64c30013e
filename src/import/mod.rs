//! Dependency declarations embedded in script import lines
//!
//! ```text
//! import Foo  // @owner/repo ~> 1.0
//! import Bar  // https://example.com/bar.git == main
//! import Baz  // ../LocalPackage
//! ```

mod origin;
pub mod parser;
pub mod spec;
pub mod version;

pub use parser::{parse_line, LineParse, ParseContext, ParseNotices};
pub use spec::{Constraint, DependencySpec, ExactPin, Origin};
