// In-memory FAT12 allocation table
// Entries are 12 bits, two packed into every three bytes

use bootfloppy_core::{BuildError, BuildResult};
use bootfloppy_formatters::fat_common::{FAT12_EOC, FAT12_EOC_MIN, FAT12_FREE};
use log::debug;

pub struct Fat12Table {
    data: Vec<u8>,
    /// One past the highest valid cluster number
    cluster_limit: u32,
    free_cluster_hint: u32,
    dirty: bool,
}

impl Fat12Table {
    pub fn new(data: Vec<u8>, total_clusters: u32) -> BuildResult<Self> {
        let cluster_limit = total_clusters + 2;
        let needed = (cluster_limit as usize * 3).div_ceil(2);
        if data.len() < needed {
            return Err(BuildError::InvalidVolume(format!(
                "FAT is {} bytes but {} clusters need {}", data.len(), total_clusters, needed
            )));
        }
        Ok(Self { data, cluster_limit, free_cluster_hint: 2, dirty: false })
    }
    
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
    
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
    
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
    
    pub fn is_valid_cluster(&self, cluster: u32) -> bool {
        cluster >= 2 && cluster < self.cluster_limit
    }
    
    pub fn get(&self, cluster: u32) -> u16 {
        let offset = (cluster + cluster / 2) as usize;
        let pair = u16::from_le_bytes([self.data[offset], self.data[offset + 1]]);
        if cluster & 1 == 1 {
            pair >> 4
        } else {
            pair & 0x0FFF
        }
    }
    
    pub fn set(&mut self, cluster: u32, value: u16) {
        let offset = (cluster + cluster / 2) as usize;
        let value = value & 0x0FFF;
        if cluster & 1 == 1 {
            self.data[offset] = (self.data[offset] & 0x0F) | ((value << 4) as u8);
            self.data[offset + 1] = (value >> 4) as u8;
        } else {
            self.data[offset] = value as u8;
            self.data[offset + 1] = (self.data[offset + 1] & 0xF0) | ((value >> 8) as u8);
        }
        self.dirty = true;
    }
    
    pub fn free_count(&self) -> u32 {
        (2..self.cluster_limit).filter(|&c| self.get(c) == FAT12_FREE).count() as u32
    }
    
    fn find_free(&mut self) -> BuildResult<u32> {
        let found = (self.free_cluster_hint..self.cluster_limit)
            .chain(2..self.free_cluster_hint)
            .find(|&c| self.get(c) == FAT12_FREE);
        match found {
            Some(cluster) => {
                self.free_cluster_hint = cluster + 1;
                Ok(cluster)
            }
            None => Err(BuildError::NoSpace("no free clusters".into())),
        }
    }
    
    /// Allocate `count` clusters, linking them after `tail` when given.
    /// Checks free space first so a failure allocates nothing.
    pub fn allocate_chain(&mut self, count: u32, tail: Option<u32>) -> BuildResult<Vec<u32>> {
        let free = self.free_count();
        if count > free {
            return Err(BuildError::NoSpace(format!("{} clusters needed, {} free", count, free)));
        }
        
        let mut clusters = Vec::with_capacity(count as usize);
        let mut prev = tail;
        for _ in 0..count {
            let cluster = self.find_free()?;
            self.set(cluster, FAT12_EOC);
            if let Some(p) = prev {
                self.set(p, cluster as u16);
            }
            clusters.push(cluster);
            prev = Some(cluster);
        }
        
        debug!("Allocated clusters {:?}", clusters.first().zip(clusters.last()));
        Ok(clusters)
    }
    
    /// Follow a chain from `start`
    pub fn chain(&self, start: u32) -> BuildResult<Vec<u32>> {
        let mut chain = Vec::new();
        let mut current = start;
        
        while self.is_valid_cluster(current) {
            if chain.len() as u32 >= self.cluster_limit {
                return Err(BuildError::InvalidVolume("cluster chain is circular".into()));
            }
            chain.push(current);
            let next = self.get(current);
            if next >= FAT12_EOC_MIN {
                break;
            }
            current = next as u32;
        }
        
        Ok(chain)
    }
}
