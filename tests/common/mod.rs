pub mod synthetic_roots;
