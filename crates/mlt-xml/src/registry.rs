//! Pass 0 of the serializer: assigns a stable id to every non-root
//! producer/playlist, in first-encountered order, maintaining a map from
//! service identity to id.

use std::collections::HashMap;
use std::sync::Arc;

use mlt_compose::Playlist;
use mlt_service::Producer;

use crate::model::{RootNode, TrackNode};

fn producer_identity(p: &Arc<dyn Producer>) -> usize {
    Arc::as_ptr(p) as *const () as usize
}

fn playlist_identity(p: &Arc<Playlist>) -> usize {
    Arc::as_ptr(p) as *const () as usize
}

pub struct Registry {
    producer_ids: HashMap<usize, String>,
    playlist_ids: HashMap<usize, String>,
    pub producers: Vec<(String, Arc<dyn Producer>)>,
    pub playlists: Vec<(String, Arc<Playlist>)>,
}

impl Registry {
    pub fn build(root: &RootNode) -> Self {
        let mut registry = Self {
            producer_ids: HashMap::new(),
            playlist_ids: HashMap::new(),
            producers: Vec::new(),
            playlists: Vec::new(),
        };
        match root {
            RootNode::Producer(_) => {}
            RootNode::Playlist(playlist) => registry.walk_playlist_clips(playlist),
            RootNode::Tractor(_tractor, tracks) => {
                for track in tracks {
                    match track {
                        TrackNode::Producer(p) => {
                            registry.register_producer(p);
                        }
                        TrackNode::Playlist(playlist) => {
                            registry.register_playlist(playlist);
                        }
                    }
                }
            }
        }
        registry
    }

    fn walk_playlist_clips(&mut self, playlist: &Arc<Playlist>) {
        for index in 0..playlist.clip_count() {
            if let Some(producer) = playlist.entry_producer(index) {
                self.register_producer(&producer);
            }
        }
    }

    pub fn register_producer(&mut self, producer: &Arc<dyn Producer>) -> String {
        let key = producer_identity(producer);
        if let Some(id) = self.producer_ids.get(&key) {
            return id.clone();
        }
        let id = format!("producer{}", self.producers.len());
        self.producer_ids.insert(key, id.clone());
        self.producers.push((id.clone(), producer.clone()));
        id
    }

    pub fn register_playlist(&mut self, playlist: &Arc<Playlist>) -> String {
        let key = playlist_identity(playlist);
        if let Some(id) = self.playlist_ids.get(&key) {
            return id.clone();
        }
        self.walk_playlist_clips(playlist);
        let id = format!("playlist{}", self.playlists.len());
        self.playlist_ids.insert(key, id.clone());
        self.playlists.push((id.clone(), playlist.clone()));
        id
    }

    pub fn producer_id(&self, producer: &Arc<dyn Producer>) -> Option<&str> {
        self.producer_ids
            .get(&producer_identity(producer))
            .map(|s| s.as_str())
    }

    pub fn playlist_id(&self, playlist: &Arc<Playlist>) -> Option<&str> {
        self.playlist_ids
            .get(&playlist_identity(playlist))
            .map(|s| s.as_str())
    }
}
