//! 전송 계획 (클라이언트측)
//!
//! - 파일을 워커 수만큼 연속 구간으로 분할, 마지막 구간이 나머지 흡수
//! - 서버는 라운드로빈 배정
//! - 출력 버퍼는 구간별 소유 영역(Region)으로 나눠서 워커에 넘김
//!
//! 분할 결과는 [0, file_size)를 정확히 한 번씩 덮어야 하며, 워커 시작 전에 검증

use std::net::SocketAddr;
use std::ops::Range;

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use crate::{Error, Result};

/// 청크 배정 (생성 후 불변)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkAssignment {
    /// 청크 인덱스 (= 워커 번호)
    pub index: usize,
    /// 담당 서버
    pub server: SocketAddr,
    pub filename: String,
    /// 파일 내 시작 오프셋
    pub offset: u64,
    /// 구간 길이 (>= 1)
    pub length: u64,
}

impl ChunkAssignment {
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// 출력 버퍼 내 목적지 범위
    pub fn region_range(&self) -> Range<u64> {
        self.offset..self.end()
    }
}

/// 파일 크기를 워커들에게 분할
///
/// 워커 수가 파일 크기보다 크면 파일 크기로 줄임 (길이 0 구간 없음)
pub fn plan(
    file_size: u64,
    worker_count: usize,
    servers: &[SocketAddr],
    filename: &str,
) -> Result<Vec<ChunkAssignment>> {
    if file_size == 0 {
        return Err(Error::EmptyFile);
    }
    if servers.is_empty() {
        return Err(Error::NoServers);
    }
    if worker_count == 0 {
        return Err(Error::Partition("worker count must be at least 1".into()));
    }

    let workers = (worker_count as u64).min(file_size);
    if workers < worker_count as u64 {
        warn!(
            "워커 수가 파일 크기보다 큼, {} -> {}로 조정",
            worker_count, workers
        );
    }

    // 최소 청크 크기 1바이트
    let chunk_size = (file_size / workers).max(1);

    let assignments: Vec<ChunkAssignment> = (0..workers)
        .map(|i| {
            let offset = i * chunk_size;
            let length = if i == workers - 1 {
                file_size - offset
            } else {
                chunk_size
            };
            let index = i as usize;

            ChunkAssignment {
                index,
                server: servers[index % servers.len()],
                filename: filename.to_string(),
                offset,
                length,
            }
        })
        .collect();

    validate(&assignments, file_size)?;

    debug!(
        "분할 완료: file_size={}, chunk_size={}, workers={}",
        file_size, chunk_size, workers
    );

    Ok(assignments)
}

/// 분할 검증: 정렬 시 0부터 빈틈/겹침 없이 file_size까지 연속
pub fn validate(assignments: &[ChunkAssignment], file_size: u64) -> Result<()> {
    if assignments.is_empty() {
        return Err(Error::Partition("no chunk assignments".into()));
    }

    let mut sorted: Vec<&ChunkAssignment> = assignments.iter().collect();
    sorted.sort_by_key(|a| a.offset);

    let mut cursor = 0u64;
    for assignment in sorted {
        if assignment.length == 0 {
            return Err(Error::Partition(format!(
                "chunk {} has zero length",
                assignment.index
            )));
        }
        if assignment.offset != cursor {
            return Err(Error::Partition(format!(
                "chunk {} starts at {}, expected {} (gap or overlap)",
                assignment.index, assignment.offset, cursor
            )));
        }

        let end = assignment
            .offset
            .checked_add(assignment.length)
            .filter(|&end| end <= file_size)
            .ok_or_else(|| {
                Error::Partition(format!(
                    "chunk {} ({}+{}) exceeds file size {}",
                    assignment.index, assignment.offset, assignment.length, file_size
                ))
            })?;
        cursor = end;
    }

    if cursor != file_size {
        return Err(Error::Partition(format!(
            "chunks cover {} of {} bytes",
            cursor, file_size
        )));
    }

    Ok(())
}

/// 출력 버퍼의 소유 영역 (워커 하나가 단독으로 씀)
#[derive(Debug)]
pub struct Region {
    index: usize,
    offset: u64,
    buf: BytesMut,
}

impl Region {
    /// 청크 인덱스
    pub fn index(&self) -> usize {
        self.index
    }

    /// 파일 내 시작 오프셋
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// 영역 내 위치에 기록 (범위 밖이면 에러, 버퍼는 그대로)
    pub fn write_at(&mut self, pos: usize, data: &[u8]) -> Result<()> {
        let region_len = self.buf.len();
        let end = pos
            .checked_add(data.len())
            .filter(|&end| end <= region_len)
            .ok_or(Error::RegionOverflow {
                start: pos,
                end: pos.saturating_add(data.len()),
                region_len,
            })?;

        self.buf[pos..end].copy_from_slice(data);
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

/// 파일 크기만큼 버퍼 하나를 할당하고 배정별 영역으로 분할
///
/// 반환 순서는 `assignments` 순서와 같음
pub fn split_regions(file_size: u64, assignments: &[ChunkAssignment]) -> Result<Vec<Region>> {
    validate(assignments, file_size)?;

    let size = usize::try_from(file_size).map_err(|_| {
        Error::Partition(format!("file size {} does not fit in memory", file_size))
    })?;

    let mut order: Vec<usize> = (0..assignments.len()).collect();
    order.sort_by_key(|&i| assignments[i].offset);

    let mut whole = BytesMut::zeroed(size);
    let mut slots: Vec<Option<Region>> = (0..assignments.len()).map(|_| None).collect();

    for i in order {
        let assignment = &assignments[i];
        // 검증을 통과했으므로 길이는 남은 버퍼 안에 있음
        let buf = whole.split_to(assignment.length as usize);
        slots[i] = Some(Region {
            index: assignment.index,
            offset: assignment.offset,
            buf,
        });
    }

    Ok(slots.into_iter().flatten().collect())
}

/// 영역들을 오프셋 순으로 다시 합쳐서 완성된 버퍼 반환
pub fn assemble(mut regions: Vec<Region>, file_size: u64) -> Result<Bytes> {
    regions.sort_by_key(|r| r.offset);

    let mut iter = regions.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| Error::Partition("no regions to assemble".into()))?;
    if first.offset != 0 {
        return Err(Error::Partition(format!(
            "first region starts at {}",
            first.offset
        )));
    }

    let mut cursor = first.buf.len() as u64;
    let mut whole = first.buf;

    for region in iter {
        if region.offset != cursor {
            return Err(Error::Partition(format!(
                "region {} starts at {}, expected {}",
                region.index, region.offset, cursor
            )));
        }
        cursor += region.buf.len() as u64;
        // 같은 할당에서 연속이면 복사 없이 합쳐짐
        whole.unsplit(region.buf);
    }

    if cursor != file_size {
        return Err(Error::Partition(format!(
            "assembled {} of {} bytes",
            cursor, file_size
        )));
    }

    Ok(whole.freeze())
}
