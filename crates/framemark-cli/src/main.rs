// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use clap::{Parser, Subcommand};
use framemark::{
    AnnotationStore, AnnotationsRecord, Collection, Error, FileAnnotationStore, FrameSet, Label,
    LabelSet, ObjectState, Saver, Settings,
};
use log::debug;
use serde::Deserialize;
use std::{fs::File, path::PathBuf};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Task file holding labels, frame metadata and annotations
    #[clap(long, env = "FRAMEMARK_TASK")]
    task: PathBuf,

    /// Settings file, defaults to settings.toml in the user config directory
    #[clap(long, env = "FRAMEMARK_CONFIG")]
    config: Option<PathBuf>,

    /// Framemark Command
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Print per-label annotation counts.
    Stats,
    /// Print the state of every object visible on a frame.
    Frame {
        /// Frame number
        frame: u32,
    },
    /// Print the object nearest to a point on a frame, and its distance.
    Select {
        /// Frame number
        frame: u32,

        /// X coordinate in pixels
        x: f64,

        /// Y coordinate in pixels
        y: f64,
    },
    /// Merge shapes and tracks of one label into a single track.
    Merge {
        /// Client ids of the objects to merge
        #[clap(long, required = true, value_delimiter = ',')]
        ids: Vec<u64>,

        /// Write the resulting annotations to this file
        #[clap(long)]
        output: Option<PathBuf>,
    },
    /// Split a track in two on a frame.
    Split {
        /// Client id of the track
        id: u64,

        /// Frame on which the second track starts
        frame: u32,

        /// Write the resulting annotations to this file
        #[clap(long)]
        output: Option<PathBuf>,
    },
    /// Put objects into a new group, or back into group 0.
    Group {
        /// Client ids of the objects to group
        #[clap(long, required = true, value_delimiter = ',')]
        ids: Vec<u64>,

        /// Reset the objects to group 0
        #[clap(long)]
        reset: bool,

        /// Write the resulting annotations to this file
        #[clap(long)]
        output: Option<PathBuf>,
    },
    /// Delete an object. Locked objects need --force.
    Delete {
        /// Client id of the object
        id: u64,

        /// Delete even if the object is locked
        #[clap(long)]
        force: bool,

        /// Write the resulting annotations to this file
        #[clap(long)]
        output: Option<PathBuf>,
    },
    /// Print the annotations in the wire format.
    Export,
    /// Persist the annotations into a JSON annotation store.
    Save {
        /// Store file, created when missing
        store: PathBuf,
    },
}

/// Task file layout.
#[derive(Deserialize, Debug)]
struct Task {
    labels: Vec<Label>,
    #[serde(default)]
    frames: FrameSet,
    #[serde(default)]
    annotations: AnnotationsRecord,
}

fn load_collection(task: &PathBuf, settings: Settings) -> Result<Collection, Error> {
    let task: Task = serde_json::from_reader(File::open(task)?)?;
    let mut collection = Collection::new(LabelSet::new(task.labels), task.frames, settings);
    collection.import(&task.annotations)?;
    debug!("Loaded {} annotations", collection.len());
    Ok(collection)
}

/// States of the given objects, each on the frame the object starts on.
fn states_of(collection: &mut Collection, ids: &[u64]) -> Result<Vec<ObjectState>, Error> {
    ids.iter()
        .map(|id| {
            let frame = collection
                .find(*id)
                .ok_or_else(|| Error::ArgumentError(format!("No object with client id {}", id)))?
                .core()
                .frame();
            collection.state(*id, frame)
        })
        .collect()
}

fn write_output(collection: &Collection, output: Option<PathBuf>) -> Result<(), Error> {
    if let Some(output) = output {
        serde_json::to_writer_pretty(File::create(&output)?, &collection.export())?;
        debug!("Annotations written to {:?}", output);
    }
    Ok(())
}

fn handle_stats(collection: &Collection) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(&collection.statistics())?);
    Ok(())
}

fn handle_frame(collection: &mut Collection, frame: u32) -> Result<(), Error> {
    let states = collection.get(frame)?;
    println!("{}", serde_json::to_string_pretty(&states)?);
    Ok(())
}

fn handle_select(collection: &mut Collection, frame: u32, x: f64, y: f64) -> Result<(), Error> {
    let states = collection.get(frame)?;
    let (state, distance) = collection.select(&states, x, y);
    let result = serde_json::json!({ "state": state, "distance": distance });
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn handle_merge(collection: &mut Collection, ids: Vec<u64>, output: Option<PathBuf>) -> Result<(), Error> {
    let states = states_of(collection, &ids)?;
    let track = collection.merge(&states)?;
    println!("Merged {:?} into track {}", ids, track);
    write_output(collection, output)
}

fn handle_split(collection: &mut Collection, id: u64, frame: u32, output: Option<PathBuf>) -> Result<(), Error> {
    let state = collection.state(id, frame)?;
    match collection.split(&state, frame)? {
        Some((earlier, later)) => println!("Split track {} into {} and {}", id, earlier, later),
        None => println!("Track {} starts on or after frame {}, nothing to split", id, frame),
    }
    write_output(collection, output)
}

fn handle_group(
    collection: &mut Collection,
    ids: Vec<u64>,
    reset: bool,
    output: Option<PathBuf>,
) -> Result<(), Error> {
    let states = states_of(collection, &ids)?;
    let group = collection.group(&states, reset)?;
    println!("Objects {:?} are in group {}", ids, group);
    write_output(collection, output)
}

fn handle_delete(collection: &mut Collection, id: u64, force: bool, output: Option<PathBuf>) -> Result<(), Error> {
    if collection.delete(id, force)? {
        println!("Deleted object {}", id);
    } else {
        println!("Object {} is locked, use --force to delete it", id);
    }
    write_output(collection, output)
}

fn handle_export(collection: &Collection) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(&collection.export())?);
    Ok(())
}

fn handle_save(collection: &mut Collection, store: PathBuf) -> Result<(), Error> {
    let store = FileAnnotationStore::with_path(store);
    let mut saver = match store.load()? {
        Some(existing) => Saver::from_loaded(&existing),
        None => Saver::new(),
    };
    let response = saver.save(collection, &store)?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let config = args
        .config
        .or_else(|| Settings::default_path().filter(|path| path.exists()));
    let settings = Settings::load(config.as_deref())?;
    let mut collection = load_collection(&args.task, settings)?;

    match args.cmd {
        Command::Stats => handle_stats(&collection),
        Command::Frame { frame } => handle_frame(&mut collection, frame),
        Command::Select { frame, x, y } => handle_select(&mut collection, frame, x, y),
        Command::Merge { ids, output } => handle_merge(&mut collection, ids, output),
        Command::Split { id, frame, output } => handle_split(&mut collection, id, frame, output),
        Command::Group { ids, reset, output } => handle_group(&mut collection, ids, reset, output),
        Command::Delete { id, force, output } => handle_delete(&mut collection, id, force, output),
        Command::Export => handle_export(&collection),
        Command::Save { store } => handle_save(&mut collection, store),
    }
}
