use json_prefs::StoreFactory;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), json_prefs::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::temp_dir()
        .join("json_prefs_demo")
        .join("settings.json");
    let prefs = StoreFactory::with_path(&path);
    let root = prefs.root_node()?;

    // plain keys
    root.put("theme", "dark")?;
    println!("theme = {}", root.get_or("theme", "light")?);

    // child nodes
    let window = root.child("window")?;
    window.put_f64("width", 1280.0)?;
    window.put_bool("maximized", false)?;
    println!(
        "window = {} wide, maximized: {}",
        window.get_f64("width", 800.0)?,
        window.get_bool("maximized", true)?
    );

    // lists
    let recent = root.child("recentWorkspaces")?;
    let mut workspaces = recent.get_list("workspaces")?;
    workspaces.retain(|w| w != "/tmp/project");
    workspaces.insert(0, "/tmp/project".to_string());
    workspaces.truncate(10);
    recent.put_list("workspaces", workspaces)?;
    println!("recent = {:?}", recent.get_list("workspaces")?);

    // leaf and node names can't clash
    if let Err(e) = root.put("window", "oops") {
        println!("expected error: {e}");
    }

    println!("children = {:?}", root.child_names()?);
    println!("file     = {}", prefs.backing_file_path().display());

    let _ = std::fs::remove_file(&path);
    Ok(())
}
