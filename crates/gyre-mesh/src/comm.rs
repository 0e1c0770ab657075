//! Inter-rank communication: global reductions and x-halo exchange.
//!
//! Ranks own disjoint contiguous x-slabs, so the only neighbour
//! traffic is with rank `r - 1` (lower) and `r + 1` (upper). Every
//! operation here is collective: all ranks must call it in the same
//! order or the group stalls.

use crate::error::CommError;
use crossbeam_channel::{unbounded, Receiver, Sender};

/// Halo columns received from the x neighbours.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct XHalo {
    /// Data from rank `r - 1`, absent on the first rank.
    pub from_lower: Option<Vec<f64>>,
    /// Data from rank `r + 1`, absent on the last rank.
    pub from_upper: Option<Vec<f64>>,
}

/// Collective operations across the ranks sharing a mesh.
pub trait Communicator: Send + Sync + 'static {
    /// This process's rank in `0..size()`.
    fn rank(&self) -> usize;

    /// Number of ranks.
    fn size(&self) -> usize;

    /// Sum `local` over every rank. All ranks receive the same total.
    fn all_reduce_sum(&self, local: u64) -> Result<u64, CommError>;

    /// Send `to_lower` to rank `r - 1` and `to_upper` to rank `r + 1`,
    /// returning what those neighbours sent here. Buffers addressed to a
    /// neighbour that does not exist are dropped.
    fn exchange_x(&self, to_lower: Vec<f64>, to_upper: Vec<f64>) -> Result<XHalo, CommError>;
}

/// A communicator for a single rank.
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleProcess;

impl Communicator for SingleProcess {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_reduce_sum(&self, local: u64) -> Result<u64, CommError> {
        Ok(local)
    }

    fn exchange_x(&self, _to_lower: Vec<f64>, _to_upper: Vec<f64>) -> Result<XHalo, CommError> {
        Ok(XHalo::default())
    }
}

/// Rank 0's side of the reduction.
struct ReduceRoot {
    inbox: Receiver<u64>,
    replies: Vec<Sender<Option<u64>>>,
}

/// Threads-as-ranks communicator backed by crossbeam channels.
///
/// Build a group with [`ChannelComm::group`] and move one member into
/// each worker thread. Reductions gather at rank 0 and broadcast back;
/// halo exchange uses one channel per direction per neighbour pair, so
/// messages from a given neighbour are always received in send order.
pub struct ChannelComm {
    rank: usize,
    size: usize,
    to_root: Sender<u64>,
    root: Option<ReduceRoot>,
    from_root: Receiver<Option<u64>>,
    to_lower: Option<Sender<Vec<f64>>>,
    to_upper: Option<Sender<Vec<f64>>>,
    from_lower: Option<Receiver<Vec<f64>>>,
    from_upper: Option<Receiver<Vec<f64>>>,
}

impl ChannelComm {
    /// Create `size` connected communicators, indexed by rank.
    pub fn group(size: usize) -> Vec<ChannelComm> {
        let (to_root, inbox) = unbounded();
        let mut replies = Vec::with_capacity(size);
        let mut reply_rx = Vec::with_capacity(size);
        for _ in 0..size {
            let (tx, rx) = unbounded();
            replies.push(tx);
            reply_rx.push(rx);
        }

        // up[r] carries r -> r+1, down[r] carries r+1 -> r.
        let mut up = Vec::new();
        let mut down = Vec::new();
        for _ in 1..size {
            up.push(unbounded::<Vec<f64>>());
            down.push(unbounded::<Vec<f64>>());
        }

        let mut root = Some(ReduceRoot { inbox, replies });
        reply_rx
            .into_iter()
            .enumerate()
            .map(|(rank, from_root)| ChannelComm {
                rank,
                size,
                to_root: to_root.clone(),
                root: if rank == 0 { root.take() } else { None },
                from_root,
                to_lower: rank.checked_sub(1).map(|l| down[l].0.clone()),
                to_upper: (rank + 1 < size).then(|| up[rank].0.clone()),
                from_lower: rank.checked_sub(1).map(|l| up[l].1.clone()),
                from_upper: (rank + 1 < size).then(|| down[rank].1.clone()),
            })
            .collect()
    }
}

impl Communicator for ChannelComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_reduce_sum(&self, local: u64) -> Result<u64, CommError> {
        match &self.root {
            Some(root) => {
                let mut total = Some(local);
                for _ in 1..self.size {
                    let v = root
                        .inbox
                        .recv()
                        .map_err(|_| CommError::Disconnected { peer: 0 })?;
                    total = total.and_then(|t| t.checked_add(v));
                }
                for (peer, tx) in root.replies.iter().enumerate().skip(1) {
                    tx.send(total)
                        .map_err(|_| CommError::Disconnected { peer })?;
                }
                total.ok_or(CommError::Overflow)
            }
            None => {
                self.to_root
                    .send(local)
                    .map_err(|_| CommError::Disconnected { peer: 0 })?;
                self.from_root
                    .recv()
                    .map_err(|_| CommError::Disconnected { peer: 0 })?
                    .ok_or(CommError::Overflow)
            }
        }
    }

    fn exchange_x(&self, to_lower: Vec<f64>, to_upper: Vec<f64>) -> Result<XHalo, CommError> {
        if let Some(tx) = &self.to_lower {
            tx.send(to_lower).map_err(|_| CommError::Disconnected {
                peer: self.rank - 1,
            })?;
        }
        if let Some(tx) = &self.to_upper {
            tx.send(to_upper).map_err(|_| CommError::Disconnected {
                peer: self.rank + 1,
            })?;
        }
        let from_lower = match &self.from_lower {
            Some(rx) => Some(rx.recv().map_err(|_| CommError::Disconnected {
                peer: self.rank - 1,
            })?),
            None => None,
        };
        let from_upper = match &self.from_upper {
            Some(rx) => Some(rx.recv().map_err(|_| CommError::Disconnected {
                peer: self.rank + 1,
            })?),
            None => None,
        };
        Ok(XHalo {
            from_lower,
            from_upper,
        })
    }
}
