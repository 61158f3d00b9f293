//! # Voxel Geometry Engine Demo
//!
//! Entry point of the headless demo. It simply calls into the library's
//! `run()` function.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- [config.json]
//! ```

fn main() {
    voxel_geometry_engine::run();
}
