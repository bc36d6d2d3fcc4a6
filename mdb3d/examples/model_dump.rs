use mdb3d::{DirectoryTextureLoader, LoadOptions, MaterialCatalog, MdbLoader, NegativeTimePolicy};
use serde_json::json;
use std::path::PathBuf;

fn main() {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut positional = Vec::<String>::new();
    let mut full = false;
    let mut skeleton_out: Option<PathBuf> = None;
    let mut textures: Option<PathBuf> = None;
    let mut materials = MaterialCatalog::new();
    let mut options = LoadOptions::default();

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--full" => {
                full = true;
                i += 1;
            }
            "--skeleton" => {
                skeleton_out = args.get(i + 1).map(PathBuf::from);
                i += 2;
            }
            "--textures" => {
                textures = args.get(i + 1).map(PathBuf::from);
                i += 2;
            }
            "--material" => {
                // --material <id> <file>
                let id = args.get(i + 1).expect("material id");
                let path = args.get(i + 2).expect("material file");
                let text = std::fs::read_to_string(path).expect("read material");
                materials.insert_text(id, &text).expect("parse material");
                i += 3;
            }
            "--keep-negative-times" => {
                options = options.with_negative_time(NegativeTimePolicy::Keep);
                i += 1;
            }
            other => {
                positional.push(other.to_string());
                i += 1;
            }
        }
    }

    let Some(path) = positional.first().map(PathBuf::from) else {
        eprintln!(
            "usage: model_dump <file.mdb> [--full] [--skeleton out.json] [--textures dir] \
             [--material id file]... [--keep-negative-times]"
        );
        std::process::exit(2);
    };

    let bytes = std::fs::read(&path).expect("read mdb");
    let model = MdbLoader::new(options)
        .with_materials(&materials)
        .load(&bytes)
        .unwrap_or_else(|err| panic!("{}: {err}", path.display()));

    if let Some(out) = skeleton_out {
        let text = model.skeleton().to_json_string().expect("skeleton json");
        std::fs::write(&out, text).expect("write skeleton");
    }

    if full {
        println!(
            "{}",
            serde_json::to_string_pretty(&model).expect("model json")
        );
        return;
    }

    let mut loader = textures.map(DirectoryTextureLoader::new);
    let meshes = model
        .meshes()
        .iter()
        .map(|m| {
            let resolved = loader
                .as_mut()
                .map(|l| {
                    m.material
                        .resolve_textures(l)
                        .into_iter()
                        .map(|(slot, file)| json!({ "slot": slot, "file": file }))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            json!({
                "name": m.name,
                "kind": format!("{:?}", m.kind),
                "vertices": m.positions.len(),
                "triangles": m.indices.len() / 3,
                "skinned_joints": m.skin.as_ref().map(|s| s.joints().len()),
                "shader": m.material.shader,
                "textures": m.material.textures,
                "resolved_textures": resolved,
            })
        })
        .collect::<Vec<_>>();

    let clips = model
        .clips
        .iter()
        .map(|c| {
            json!({
                "name": c.name,
                "duration": c.duration,
                "offset": c.time_offset,
                "tracks": c.tracks.len(),
                "events": c.events.len(),
            })
        })
        .collect::<Vec<_>>();

    let out = json!({
        "info": model.info,
        "joints": model.mesh.joints.iter().map(|j| &j.name).collect::<Vec<_>>(),
        "meshes": meshes,
        "speedtrees": model.speedtrees.len(),
        "clips": clips,
        "skipped_clips": model.skipped_clips,
    });
    println!("{}", serde_json::to_string_pretty(&out).expect("summary json"));
}
