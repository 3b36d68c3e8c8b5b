use bevy_orbital_volume::{
    integrate::shade,
    lattice::VolumeSpec,
    texture::build_volume,
    types::Point,
};

fn main() {
    let spec = match VolumeSpec::from_size(16) {
        Ok(spec) => spec,
        Err(err) => {
            eprintln!("{err}");
            return;
        }
    };

    let texture = build_volume(&spec, &|_: Point| 1.0);
    println!("texture: {0}×{0} RGBA8", texture.size());

    let intensity = 2.0;
    let shaded = shade(
        &texture,
        &Point::new(0.0, 0.0, -2.0),
        &Point::new(0.0, 0.0, -0.5),
        intensity,
    );
    println!("path integral: {:.6}", shaded.path_integral);
    println!("alpha:         {:.6}", shaded.alpha());

    // Unsupported sizes fail before any sampling happens.
    if let Err(err) = VolumeSpec::from_size(32) {
        println!("rejected: {err}");
    }
}
