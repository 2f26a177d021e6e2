//! # Status & Transition Rules
//!
//! Closed status enums for till sessions and service orders, and the single
//! transition table every state change goes through.
//!
//! ## Service-Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Service-Order Lifecycle                             │
//! │                                                                         │
//! │  aberta ──► venda_concluida ──┬──► liberado_compra                     │
//! │                               └──► cancelada (terminal)                │
//! │                                                                         │
//! │  liberado_compra ──► aguardando_lentes ◄──┐                            │
//! │                            │              │                            │
//! │                            ▼              │                            │
//! │                      lente_recebida ──► servico_devolvido_compra       │
//! │                       │         │                                      │
//! │                       │         └──► servico_aguardando_armacao ◄──┐   │
//! │                       ▼                        │                   │   │
//! │           servico_enviado_montagem             ▼                   │   │
//! │                       │          armacao_enviada_montagem ──► devolucao│
//! │                       │                        │              _quebra_ │
//! │                       ▼                        ▼              armacao ─┘
//! │                  servico_montado_conferido ◄───┘                       │
//! │                       │                                                │
//! │                       ▼                                                │
//! │              servico_pronto_entrega (terminal)                         │
//! │                                                                         │
//! │  garantia: the fixed status of warranty-kind orders, not a             │
//! │  transition target of the original order                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The status vocabulary is a closed enum and
//! [`OrderStatus::can_transition_to`] is the one source of truth;
//! repositories enforce it with compare-and-swap updates.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Till Session Status
// =============================================================================

/// The status of a till (cash-register) session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum TillStatus {
    /// Session is open and accumulating the day's movement.
    #[default]
    Open,
    /// Session was settled (counted and closed) but the day is still running.
    Settled,
    /// The whole day was finalized. Terminal: blocks further opens today.
    DayFinalized,
}

impl TillStatus {
    /// Wire string, as stored in the database.
    pub const fn as_str(&self) -> &'static str {
        match self {
            TillStatus::Open => "open",
            TillStatus::Settled => "settled",
            TillStatus::DayFinalized => "day_finalized",
        }
    }
}

impl fmt::Display for TillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Service-Order Status
// =============================================================================

/// The status of a service order.
///
/// Serialized to the legacy wire strings (`venda_concluida`, ...) so existing
/// records and integrations keep reading naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Manually opened order, sale not yet concluded.
    Aberta,
    /// Sale completed; the order enters the production pipeline.
    VendaConcluida,
    /// Released to procurement (stockroom may start purchasing).
    LiberadoCompra,
    /// Supplier purchase placed; waiting for the lens to arrive.
    AguardandoLentes,
    /// Lens received from the supplier.
    LenteRecebida,
    /// Lens and frame sent together to assembly.
    ServicoEnviadoMontagem,
    /// Lens ready but the frame is not available yet.
    ServicoAguardandoArmacao,
    /// Lens rejected and returned to procurement.
    ServicoDevolvidoCompra,
    /// Frame (re)sent to assembly.
    ArmacaoEnviadaMontagem,
    /// Assembled and checked by the stockroom.
    ServicoMontadoConferido,
    /// Ready for customer pickup. Terminal.
    ServicoProntoEntrega,
    /// Frame broke during assembly; waiting for a replacement decision.
    DevolucaoQuebraArmacao,
    /// Cancelled. Terminal.
    Cancelada,
    /// Warranty order (a parallel order kind, not a stage of the original).
    Garantia,
}

impl OrderStatus {
    /// Wire string, as stored in the database.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Aberta => "aberta",
            OrderStatus::VendaConcluida => "venda_concluida",
            OrderStatus::LiberadoCompra => "liberado_compra",
            OrderStatus::AguardandoLentes => "aguardando_lentes",
            OrderStatus::LenteRecebida => "lente_recebida",
            OrderStatus::ServicoEnviadoMontagem => "servico_enviado_montagem",
            OrderStatus::ServicoAguardandoArmacao => "servico_aguardando_armacao",
            OrderStatus::ServicoDevolvidoCompra => "servico_devolvido_compra",
            OrderStatus::ArmacaoEnviadaMontagem => "armacao_enviada_montagem",
            OrderStatus::ServicoMontadoConferido => "servico_montado_conferido",
            OrderStatus::ServicoProntoEntrega => "servico_pronto_entrega",
            OrderStatus::DevolucaoQuebraArmacao => "devolucao_quebra_armacao",
            OrderStatus::Cancelada => "cancelada",
            OrderStatus::Garantia => "garantia",
        }
    }

    /// Legal successor states. The single source of transition truth.
    pub const fn successors(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Aberta => &[VendaConcluida],
            VendaConcluida => &[LiberadoCompra, Cancelada],
            LiberadoCompra => &[AguardandoLentes],
            AguardandoLentes => &[LenteRecebida],
            LenteRecebida => &[
                ServicoEnviadoMontagem,
                ServicoAguardandoArmacao,
                ServicoDevolvidoCompra,
            ],
            ServicoDevolvidoCompra => &[AguardandoLentes],
            ServicoAguardandoArmacao => &[ArmacaoEnviadaMontagem],
            ServicoEnviadoMontagem => &[ServicoMontadoConferido],
            ArmacaoEnviadaMontagem => &[ServicoMontadoConferido, DevolucaoQuebraArmacao],
            DevolucaoQuebraArmacao => &[ServicoAguardandoArmacao],
            ServicoMontadoConferido => &[ServicoProntoEntrega],
            ServicoProntoEntrega | Cancelada | Garantia => &[],
        }
    }

    /// Checks whether `self → to` is a legal transition.
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        self.successors().contains(&to)
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    #[test]
    fn test_happy_path_is_legal() {
        let path = [
            Aberta,
            VendaConcluida,
            LiberadoCompra,
            AguardandoLentes,
            LenteRecebida,
            ServicoEnviadoMontagem,
            ServicoMontadoConferido,
            ServicoProntoEntrega,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be legal",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_frame_branch() {
        assert!(LenteRecebida.can_transition_to(ServicoAguardandoArmacao));
        assert!(ServicoAguardandoArmacao.can_transition_to(ArmacaoEnviadaMontagem));
        assert!(ArmacaoEnviadaMontagem.can_transition_to(ServicoMontadoConferido));
    }

    #[test]
    fn test_breakage_loop() {
        // Breakage is only reachable from frame-sent-to-assembly, and
        // reactivation goes back to awaiting-frame.
        assert!(ArmacaoEnviadaMontagem.can_transition_to(DevolucaoQuebraArmacao));
        assert!(DevolucaoQuebraArmacao.can_transition_to(ServicoAguardandoArmacao));
        assert!(!LenteRecebida.can_transition_to(DevolucaoQuebraArmacao));
    }

    #[test]
    fn test_procurement_return_loop() {
        assert!(LenteRecebida.can_transition_to(ServicoDevolvidoCompra));
        assert!(ServicoDevolvidoCompra.can_transition_to(AguardandoLentes));
    }

    #[test]
    fn test_cancel_only_from_concluded_sale() {
        assert!(VendaConcluida.can_transition_to(Cancelada));
        assert!(!LiberadoCompra.can_transition_to(Cancelada));
        assert!(!ServicoProntoEntrega.can_transition_to(Cancelada));
    }

    #[test]
    fn test_terminal_states() {
        assert!(Cancelada.is_terminal());
        assert!(ServicoProntoEntrega.is_terminal());
        assert!(Garantia.is_terminal());
        assert!(!LenteRecebida.is_terminal());
    }

    #[test]
    fn test_wire_strings() {
        assert_eq!(VendaConcluida.as_str(), "venda_concluida");
        assert_eq!(ServicoAguardandoArmacao.as_str(), "servico_aguardando_armacao");
        assert_eq!(TillStatus::DayFinalized.as_str(), "day_finalized");

        // serde uses the same snake_case strings as the database
        let json = serde_json::to_string(&DevolucaoQuebraArmacao).unwrap();
        assert_eq!(json, "\"devolucao_quebra_armacao\"");
    }
}
