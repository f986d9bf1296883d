use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    // Git metadata is left out: images are often built from source tarballs
    vergen_gitcl::Emitter::default()
        .add_instructions(
            &vergen_gitcl::BuildBuilder::default()
                .build_timestamp(true)
                .build()?,
        )?
        .add_instructions(
            &vergen_gitcl::CargoBuilder::default()
                .target_triple(true)
                .build()?,
        )?
        .emit()?;
    Ok(())
}
