pub mod presentation_interface;
