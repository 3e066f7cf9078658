//! 체스 규칙 엔진 경계
//!
//! 합법 수 계산, 수 적용, 종국 판정은 전부 shakmaty에 맡긴다.
//! 이 크레이트는 직렬화된 국면(FEN)에서 매번 새 엔진을 만들어 질의하고,
//! 결과를 보드 UI가 쓰는 타입으로 옮겨 담기만 한다.

use std::fmt;
use std::str::FromStr;

use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Move, Position, Role};
use thiserror::Error;

pub use shakmaty::{File, Rank, Square};

/// 규칙 엔진 오류
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesError {
    #[error("잘못된 FEN입니다: {0}")]
    InvalidFen(String),
    #[error("불법 수입니다: {from} -> {to}")]
    IllegalMove { from: Square, to: Square },
    #[error("보드 밖 좌표입니다: ({x}, {y})")]
    InvalidSquare { x: i32, y: i32 },
    #[error("프로모션할 수 없는 기물입니다: {0}")]
    InvalidPromotion(&'static str),
    #[error("알 수 없는 기물입니다: {0}")]
    UnknownPiece(String),
}

/// 기물 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    /// 스프라이트 키에 쓰는 소문자 한 글자
    pub fn char(self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PieceKind::Pawn => "pawn",
            PieceKind::Knight => "knight",
            PieceKind::Bishop => "bishop",
            PieceKind::Rook => "rook",
            PieceKind::Queen => "queen",
            PieceKind::King => "king",
        }
    }

    /// "queen" 같은 이름이나 'q' 같은 한 글자에서 파싱
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "p" | "pawn" => Some(PieceKind::Pawn),
            "n" | "knight" => Some(PieceKind::Knight),
            "b" | "bishop" => Some(PieceKind::Bishop),
            "r" | "rook" => Some(PieceKind::Rook),
            "q" | "queen" => Some(PieceKind::Queen),
            "k" | "king" => Some(PieceKind::King),
            _ => None,
        }
    }
}

impl From<Role> for PieceKind {
    fn from(role: Role) -> Self {
        match role {
            Role::Pawn => PieceKind::Pawn,
            Role::Knight => PieceKind::Knight,
            Role::Bishop => PieceKind::Bishop,
            Role::Rook => PieceKind::Rook,
            Role::Queen => PieceKind::Queen,
            Role::King => PieceKind::King,
        }
    }
}

impl From<PieceKind> for Role {
    fn from(kind: PieceKind) -> Self {
        match kind {
            PieceKind::Pawn => Role::Pawn,
            PieceKind::Knight => Role::Knight,
            PieceKind::Bishop => Role::Bishop,
            PieceKind::Rook => Role::Rook,
            PieceKind::Queen => Role::Queen,
            PieceKind::King => Role::King,
        }
    }
}

/// 기물 색
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceColor {
    White,
    Black,
}

impl PieceColor {
    /// 스프라이트 키 접두어 ('w' | 'b')
    pub fn prefix(self) -> char {
        match self {
            PieceColor::White => 'w',
            PieceColor::Black => 'b',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PieceColor::White => "white",
            PieceColor::Black => "black",
        }
    }
}

impl From<shakmaty::Color> for PieceColor {
    fn from(color: shakmaty::Color) -> Self {
        match color {
            shakmaty::Color::White => PieceColor::White,
            shakmaty::Color::Black => PieceColor::Black,
        }
    }
}

/// 칸 위의 기물. 국면에서 매번 새로 뽑아내며 따로 캐시하지 않는다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    pub kind: PieceKind,
    pub color: PieceColor,
}

impl Piece {
    pub fn new(kind: PieceKind, color: PieceColor) -> Self {
        Self { kind, color }
    }
}

impl From<shakmaty::Piece> for Piece {
    fn from(piece: shakmaty::Piece) -> Self {
        Self {
            kind: piece.role.into(),
            color: piece.color.into(),
        }
    }
}

/// 8×8 기물 격자. 0행 = 8랭크, 0열 = a파일
pub type BoardGrid = [[Option<Piece>; 8]; 8];

/// 종국 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Checkmate { winner: PieceColor },
    Stalemate,
    InsufficientMaterial,
}

impl Outcome {
    pub fn winner(self) -> Option<PieceColor> {
        match self {
            Outcome::Checkmate { winner } => Some(winner),
            Outcome::Stalemate | Outcome::InsufficientMaterial => None,
        }
    }
}

/// 불변 국면 스냅샷 (검증된 FEN 문자열)
///
/// 컨트롤러는 국면을 이 형태로만 들고 있고, 질의나 수 적용이 필요할 때마다
/// [`RulesEngine::from_snapshot`]으로 새 엔진을 만든다.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionSnapshot(String);

impl PositionSnapshot {
    /// 표준 초기 배치
    pub fn initial() -> Self {
        RulesEngine::new().snapshot()
    }

    pub fn from_fen(fen: &str) -> Result<Self, RulesError> {
        Ok(RulesEngine::from_fen(fen)?.snapshot())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PositionSnapshot {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Display for PositionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PositionSnapshot {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_fen(s)
    }
}

/// 합법 수 상세 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveDescriptor {
    pub from: Square,
    /// 도착 칸. 캐슬링은 룩 칸이 아니라 킹이 도착하는 칸(g/c 파일)
    pub to: Square,
    pub piece: Piece,
    pub captured: Option<PieceKind>,
    pub promotion: Option<PieceKind>,
    pub san: String,
}

/// 국면 하나를 감싼 일회용 규칙 엔진
#[derive(Debug, Clone, Default)]
pub struct RulesEngine {
    position: Chess,
}

impl RulesEngine {
    /// 초기 배치로 엔진 생성
    pub fn new() -> Self {
        Self {
            position: Chess::default(),
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self, RulesError> {
        let fen: Fen = fen
            .trim()
            .parse()
            .map_err(|err: shakmaty::fen::ParseFenError| RulesError::InvalidFen(err.to_string()))?;
        let position = fen
            .into_position::<Chess>(CastlingMode::Standard)
            .map_err(|err| RulesError::InvalidFen(err.to_string()))?;
        Ok(Self { position })
    }

    pub fn from_snapshot(snapshot: &PositionSnapshot) -> Result<Self, RulesError> {
        Self::from_fen(snapshot.as_str())
    }

    /// 현재 국면 직렬화
    pub fn snapshot(&self) -> PositionSnapshot {
        PositionSnapshot(Fen::from_position(&self.position, EnPassantMode::Legal).to_string())
    }

    pub fn turn(&self) -> PieceColor {
        self.position.turn().into()
    }

    pub fn is_check(&self) -> bool {
        self.position.is_check()
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.position.board().piece_at(square).map(Piece::from)
    }

    /// 8랭크부터 1랭크 순서의 행 우선 기물 격자
    pub fn board(&self) -> BoardGrid {
        let mut grid: BoardGrid = [[None; 8]; 8];
        for (row, cells) in grid.iter_mut().enumerate() {
            let rank = Rank::new(7 - row as u32);
            for (file, cell) in cells.iter_mut().enumerate() {
                let square = Square::from_coords(File::new(file as u32), rank);
                *cell = self.piece_at(square);
            }
        }
        grid
    }

    /// `from` 칸에서 출발하는 모든 합법 수
    ///
    /// 빈 칸이나 둘 차례가 아닌 쪽 기물이면 빈 목록이 나온다.
    /// 프로모션은 승격 기물마다 하나씩 나오므로 도착 칸이 겹칠 수 있다.
    pub fn moves(&self, from: Square) -> Vec<MoveDescriptor> {
        self.position
            .legal_moves()
            .into_iter()
            .filter(|m| m.from() == Some(from))
            .map(|m| self.describe(from, m))
            .collect()
    }

    /// `from -> to` 수를 두고 새 스냅샷을 돌려준다.
    ///
    /// 승격 후보가 여럿이면 `promotion` 기물을 고른다.
    pub fn apply(
        &mut self,
        from: Square,
        to: Square,
        promotion: PieceKind,
    ) -> Result<PositionSnapshot, RulesError> {
        let preferred = Role::from(promotion);
        let candidates: Vec<Move> = self
            .position
            .legal_moves()
            .into_iter()
            .filter(|m| m.from() == Some(from) && destination(m) == to)
            .collect();

        let chosen = candidates
            .iter()
            .find(|m| m.promotion().map_or(true, |role| role == preferred))
            .or_else(|| candidates.first())
            .cloned()
            .ok_or(RulesError::IllegalMove { from, to })?;

        log::debug!("{} -> {} 적용", from, to);
        self.position = self
            .position
            .clone()
            .play(chosen)
            .map_err(|_| RulesError::IllegalMove { from, to })?;
        Ok(self.snapshot())
    }

    /// 종국이면 결과, 진행 중이면 None
    pub fn outcome(&self) -> Option<Outcome> {
        if self.position.is_checkmate() {
            Some(Outcome::Checkmate {
                winner: self.position.turn().other().into(),
            })
        } else if self.position.is_stalemate() {
            Some(Outcome::Stalemate)
        } else if self.position.is_insufficient_material() {
            Some(Outcome::InsufficientMaterial)
        } else {
            None
        }
    }

    fn describe(&self, from: Square, m: Move) -> MoveDescriptor {
        MoveDescriptor {
            from,
            to: destination(&m),
            piece: Piece::new(m.role().into(), self.turn()),
            captured: m.capture().map(PieceKind::from),
            promotion: m.promotion().map(PieceKind::from),
            san: San::from_move(&self.position, m).to_string(),
        }
    }
}

/// UI에서 클릭하는 도착 칸. 캐슬링은 킹의 도착 칸으로 바꾼다.
fn destination(m: &Move) -> Square {
    match m {
        Move::Castle { king, rook, .. } => {
            let file = if rook.file() > king.file() {
                File::G
            } else {
                File::C
            };
            Square::from_coords(file, king.rank())
        }
        _ => m.to(),
    }
}
