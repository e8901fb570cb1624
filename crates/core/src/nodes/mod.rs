pub mod film_interpolation;
pub mod load_film_model;
