//! Default locations of the game's files under the user's Documents

use std::{
    env,
    path::{Path, PathBuf},
};

/// Documents folder names the game is known to use, probed in order
const GAME_FOLDERS: [&str; 3] = [
    "DIE SIEDLER - DEdk",
    "THE SETTLERS - HoK",
    "The Settlers - Heritage of Kings",
];

/// The user's Documents directory, from the environment
pub fn documents_dir() -> Option<PathBuf> {
    let home = env::var_os("HOME").or_else(|| env::var_os("USERPROFILE"))?;
    Some(PathBuf::from(home).join("Documents"))
}

/// The game's documents folder: the first known name that exists under
/// `documents`. Falls back to the first candidate; the game creates it
/// on first launch.
pub fn game_documents_dir(documents: &Path) -> PathBuf {
    for name in GAME_FOLDERS {
        let candidate = documents.join(name);
        if candidate.is_dir() {
            return candidate;
        }
    }
    documents.join(GAME_FOLDERS[0])
}

/// Path of the persistent state file inside the game folder
pub fn state_file(game_dir: &Path) -> PathBuf {
    game_dir.join("Data").join("GDB.bin")
}

/// Directory holding the save folders
pub fn saves_dir(game_dir: &Path) -> PathBuf {
    game_dir.join("SaveGames")
}
