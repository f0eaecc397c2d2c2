use dashmap::DashSet;
use log::info;

/// The set of peer node URLs this node knows about.
///
/// Lives outside the ledger lock: peer bookkeeping and peer I/O never contend
/// with chain mutation. A node never lists its own URL.
#[derive(Debug)]
pub struct PeerRegistry {
    own_url: String,
    peers: DashSet<String>,
}

impl PeerRegistry {
    pub fn new(own_url: &str) -> Self {
        PeerRegistry {
            own_url: own_url.to_string(),
            peers: DashSet::new(),
        }
    }

    pub fn own_url(&self) -> &str {
        &self.own_url
    }

    /// Registers a peer URL. Returns false when the URL is this node's own
    /// or already registered.
    pub fn add(&self, url: &str) -> bool {
        if url == self.own_url {
            return false;
        }
        let added = self.peers.insert(url.to_string());
        if added {
            info!("peer {} registered", url);
        }
        added
    }

    /// Registers every URL in a network roster, skipping self and duplicates.
    pub fn add_bulk<I>(&self, urls: I)
    where
        I: IntoIterator<Item = String>,
    {
        for url in urls {
            self.add(&url);
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.peers.contains(url)
    }

    /// All registered peer URLs, sorted for stable output.
    pub fn list(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.peers.iter().map(|p| p.key().clone()).collect();
        peers.sort();
        peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
