use crate::cli::InitArgs;
use crate::error::Result;
use mdsetup::workflows::layout::DirectoryLayout;
use tracing::info;

pub fn run(args: InitArgs) -> Result<()> {
    let layout = DirectoryLayout::new(&args.outdir);
    info!("Creating project tree under {:?}", layout.root());
    let created = layout.create_tree()?;
    for dir in &created {
        println!("  {}", dir.display());
    }
    println!("Project tree ready in {}", layout.root().display());
    Ok(())
}
