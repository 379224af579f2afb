//! Sale, auction and rent transfer protocols.
//!
//! Sale and auction settlement move funds and ownership together or not at
//! all: the buyer is debited first, the cell is moved, and only then is the
//! seller credited. A failed claim restores the seller's exact group
//! structure and refunds the buyer.

use serde::{Deserialize, Serialize};

use crate::config::DominionConfig;
use crate::error::DominionError;
use crate::grid::Cell;
use crate::ledger::Ledger;
use crate::notify::Notice;
use crate::state::DominionState;
use crate::types::{Coins, TerritoryId, WorldTime};

/// A cell offered at a fixed price. Removed from the book when sold or
/// cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleListing {
    pub cell: Cell,
    pub seller: TerritoryId,
    pub price: Coins,
    pub listed_at: WorldTime,
}

/// The standing high bid of an auction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub bidder: TerritoryId,
    pub amount: Coins,
}

/// An open auction on one cell. Bids strictly increase; the previous
/// bidder is refunded when outbid. Settled on expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auction {
    pub cell: Cell,
    pub seller: TerritoryId,
    pub min_bid: Coins,
    pub current: Option<Bid>,
    pub opened_at: WorldTime,
    pub expires_at: WorldTime,
}

impl Auction {
    pub fn is_expired(&self, now: WorldTime) -> bool {
        now >= self.expires_at
    }
}

/// A time-bounded access grant. Never mutates the ownership index; it
/// lapses at expiry, re-checked on every access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentGrant {
    pub cell: Cell,
    pub owner: TerritoryId,
    pub renter: TerritoryId,
    pub daily_rate: Coins,
    pub days: u32,
    pub started_at: WorldTime,
    pub expires_at: WorldTime,
}

impl RentGrant {
    pub fn is_active(&self, now: WorldTime) -> bool {
        now < self.expires_at
    }
}

impl DominionState {
    pub fn list_for_sale(
        &mut self,
        territory_id: &str,
        cell: Cell,
        price: Coins,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        if price <= 0 {
            return Err(DominionError::InvalidAmount { amount: price });
        }
        self.require_owner(territory_id, &cell)?;
        if self.book.sales.contains_key(&cell) || self.book.auctions.contains_key(&cell) {
            return Err(DominionError::DuplicateListing { cell });
        }
        self.book.sales.insert(
            cell.clone(),
            SaleListing {
                cell: cell.clone(),
                seller: territory_id.to_string(),
                price,
                listed_at: now,
            },
        );
        self.push_notice(territory_id, Notice::SaleListed { cell, price });
        Ok(())
    }

    pub fn cancel_sale(&mut self, territory_id: &str, cell: &Cell) -> Result<(), DominionError> {
        let listing = self
            .book
            .sales
            .get(cell)
            .ok_or_else(|| DominionError::ListingNotFound { cell: cell.clone() })?;
        if listing.seller != territory_id {
            return Err(DominionError::NotOwner {
                cell: cell.clone(),
                owner: listing.seller.clone(),
            });
        }
        self.book.sales.remove(cell);
        self.push_notice(
            territory_id,
            Notice::SaleCancelled {
                cell: cell.clone(),
                reason: "withdrawn by seller".to_string(),
            },
        );
        Ok(())
    }

    /// Fixed-price purchase. Debits the buyer, moves the cell, credits the
    /// seller. A claim failure on the buyer's side rolls everything back
    /// and cancels the listing.
    pub fn buy_cell(
        &mut self,
        config: &DominionConfig,
        ledger: &dyn Ledger,
        buyer_id: &str,
        cell: &Cell,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        let listing = self
            .book
            .sales
            .get(cell)
            .cloned()
            .ok_or_else(|| DominionError::ListingNotFound { cell: cell.clone() })?;
        self.registry.get(buyer_id)?;
        if listing.seller == buyer_id {
            return Err(DominionError::SelfTransfer {
                territory_id: buyer_id.to_string(),
            });
        }
        // Re-validate against the authoritative index: the seller may have
        // lost the cell since listing it.
        if self.index.peek(cell).map(String::as_str) != Some(listing.seller.as_str()) {
            self.book.sales.remove(cell);
            return Err(DominionError::ListingNotFound { cell: cell.clone() });
        }

        if !ledger.debit(buyer_id, listing.price) {
            return Err(DominionError::InsufficientFunds {
                account: buyer_id.to_string(),
                amount: listing.price,
            });
        }

        let removed = self.remove_cell_for(&listing.seller, cell)?;
        match self.claim_transferred(config, buyer_id, cell.clone(), None, now) {
            Ok(()) => {
                self.book.sales.remove(cell);
                ledger.credit(&listing.seller, listing.price);
                self.push_notice(
                    &listing.seller,
                    Notice::SaleCompleted {
                        cell: cell.clone(),
                        price: listing.price,
                        buyer: buyer_id.to_string(),
                    },
                );
                self.push_notice(
                    buyer_id,
                    Notice::SaleCompleted {
                        cell: cell.clone(),
                        price: listing.price,
                        buyer: buyer_id.to_string(),
                    },
                );
                Ok(())
            }
            Err(error) => {
                self.restore_removed(&listing.seller, cell.clone(), removed)?;
                ledger.credit(buyer_id, listing.price);
                self.book.sales.remove(cell);
                self.push_notice(
                    &listing.seller,
                    Notice::SaleCancelled {
                        cell: cell.clone(),
                        reason: "buyer could not claim the cell".to_string(),
                    },
                );
                Err(error)
            }
        }
    }

    pub fn open_auction(
        &mut self,
        territory_id: &str,
        cell: Cell,
        min_bid: Coins,
        duration: WorldTime,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        if min_bid <= 0 {
            return Err(DominionError::InvalidAmount { amount: min_bid });
        }
        self.require_owner(territory_id, &cell)?;
        if self.book.sales.contains_key(&cell) || self.book.auctions.contains_key(&cell) {
            return Err(DominionError::DuplicateListing { cell });
        }
        let expires_at = now.saturating_add(duration.max(1));
        self.book.auctions.insert(
            cell.clone(),
            Auction {
                cell: cell.clone(),
                seller: territory_id.to_string(),
                min_bid,
                current: None,
                opened_at: now,
                expires_at,
            },
        );
        self.push_notice(
            territory_id,
            Notice::AuctionOpened {
                cell,
                min_bid,
                expires_at,
            },
        );
        Ok(())
    }

    /// Accepts a bid that strictly exceeds the standing one (or meets the
    /// minimum for the first bid): debits the new bidder, then refunds the
    /// previous bidder.
    pub fn place_bid(
        &mut self,
        ledger: &dyn Ledger,
        bidder_id: &str,
        cell: &Cell,
        amount: Coins,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        self.registry.get(bidder_id)?;
        let auction = self
            .book
            .auctions
            .get(cell)
            .ok_or_else(|| DominionError::AuctionNotFound { cell: cell.clone() })?;
        if auction.seller == bidder_id {
            return Err(DominionError::SelfTransfer {
                territory_id: bidder_id.to_string(),
            });
        }
        if auction.is_expired(now) {
            return Err(DominionError::AuctionExpired { cell: cell.clone() });
        }
        let floor = match &auction.current {
            Some(bid) => bid.amount.saturating_add(1),
            None => auction.min_bid,
        };
        if amount < floor {
            return Err(DominionError::BidTooLow { bid: amount, floor });
        }
        if !ledger.debit(bidder_id, amount) {
            return Err(DominionError::InsufficientFunds {
                account: bidder_id.to_string(),
                amount,
            });
        }

        let previous = {
            let auction = self
                .book
                .auctions
                .get_mut(cell)
                .ok_or_else(|| DominionError::AuctionNotFound { cell: cell.clone() })?;
            auction.current.replace(Bid {
                bidder: bidder_id.to_string(),
                amount,
            })
        };
        if let Some(previous) = previous {
            ledger.credit(&previous.bidder, previous.amount);
            self.push_notice(
                &previous.bidder,
                Notice::Outbid {
                    cell: cell.clone(),
                    refunded: previous.amount,
                },
            );
        }
        Ok(())
    }

    /// Resolves an expired auction: transfers to the high bidder with the
    /// same rollback sequence as a sale, or closes with no winner.
    pub(crate) fn settle_auction(
        &mut self,
        config: &DominionConfig,
        ledger: &dyn Ledger,
        cell: &Cell,
        now: WorldTime,
    ) -> Result<Option<TerritoryId>, DominionError> {
        let auction = self
            .book
            .auctions
            .remove(cell)
            .ok_or_else(|| DominionError::AuctionNotFound { cell: cell.clone() })?;

        let Some(bid) = auction.current else {
            self.push_notice(
                &auction.seller,
                Notice::AuctionClosed {
                    cell: cell.clone(),
                    winner: None,
                },
            );
            return Ok(None);
        };

        // Stale auction: the seller no longer owns the cell.
        if self.index.peek(cell).map(String::as_str) != Some(auction.seller.as_str()) {
            ledger.credit(&bid.bidder, bid.amount);
            self.push_notice(
                &auction.seller,
                Notice::AuctionClosed {
                    cell: cell.clone(),
                    winner: None,
                },
            );
            return Ok(None);
        }

        let removed = self.remove_cell_for(&auction.seller, cell)?;
        match self.claim_transferred(config, &bid.bidder, cell.clone(), None, now) {
            Ok(()) => {
                ledger.credit(&auction.seller, bid.amount);
                self.push_notice(
                    &bid.bidder,
                    Notice::AuctionWon {
                        cell: cell.clone(),
                        amount: bid.amount,
                    },
                );
                self.push_notice(
                    &auction.seller,
                    Notice::AuctionClosed {
                        cell: cell.clone(),
                        winner: Some(bid.bidder.clone()),
                    },
                );
                Ok(Some(bid.bidder))
            }
            Err(_) => {
                self.restore_removed(&auction.seller, cell.clone(), removed)?;
                ledger.credit(&bid.bidder, bid.amount);
                self.push_notice(
                    &auction.seller,
                    Notice::AuctionClosed {
                        cell: cell.clone(),
                        winner: None,
                    },
                );
                Ok(None)
            }
        }
    }

    /// Renter pays `daily_rate * days` upfront to the owner. Ownership
    /// does not change; the grant lapses at expiry.
    pub fn start_rent(
        &mut self,
        ledger: &dyn Ledger,
        renter_id: &str,
        cell: &Cell,
        daily_rate: Coins,
        days: u32,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        if daily_rate <= 0 || days == 0 {
            return Err(DominionError::InvalidAmount { amount: daily_rate });
        }
        self.registry.get(renter_id)?;
        let owner = self
            .index
            .peek(cell)
            .cloned()
            .ok_or_else(|| DominionError::CellNotClaimed { cell: cell.clone() })?;
        if owner == renter_id {
            return Err(DominionError::SelfTransfer {
                territory_id: renter_id.to_string(),
            });
        }
        if let Some(existing) = self.book.rents.get(cell) {
            if existing.is_active(now) {
                return Err(DominionError::RentOccupied { cell: cell.clone() });
            }
            self.book.rents.remove(cell);
        }

        let total = daily_rate
            .checked_mul(Coins::from(days))
            .ok_or(DominionError::InvalidAmount { amount: daily_rate })?;
        if !ledger.debit(renter_id, total) {
            return Err(DominionError::InsufficientFunds {
                account: renter_id.to_string(),
                amount: total,
            });
        }
        ledger.credit(&owner, total);

        let expires_at =
            now.saturating_add(WorldTime::from(days).saturating_mul(crate::config::TICKS_PER_DAY));
        self.book.rents.insert(
            cell.clone(),
            RentGrant {
                cell: cell.clone(),
                owner: owner.clone(),
                renter: renter_id.to_string(),
                daily_rate,
                days,
                started_at: now,
                expires_at,
            },
        );
        self.push_notice(
            renter_id,
            Notice::RentStarted {
                cell: cell.clone(),
                renter: renter_id.to_string(),
                expires_at,
            },
        );
        self.push_notice(
            &owner,
            Notice::RentStarted {
                cell: cell.clone(),
                renter: renter_id.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    /// Whether `renter_id` holds a live grant on `cell`. Expiry is
    /// re-checked here, never cached.
    pub fn rent_active(&self, cell: &Cell, renter_id: &str, now: WorldTime) -> bool {
        self.book
            .rents
            .get(cell)
            .map(|grant| grant.renter == renter_id && grant.is_active(now))
            .unwrap_or(false)
    }

    pub(crate) fn expire_rents(&mut self, now: WorldTime) -> Vec<Cell> {
        let lapsed: Vec<RentGrant> = self
            .book
            .rents
            .values()
            .filter(|grant| !grant.is_active(now))
            .cloned()
            .collect();
        let mut cells = Vec::new();
        for grant in lapsed {
            self.book.rents.remove(&grant.cell);
            self.push_notice(
                &grant.renter,
                Notice::RentExpired {
                    cell: grant.cell.clone(),
                    renter: grant.renter.clone(),
                },
            );
            self.push_notice(
                &grant.owner,
                Notice::RentExpired {
                    cell: grant.cell.clone(),
                    renter: grant.renter.clone(),
                },
            );
            cells.push(grant.cell);
        }
        cells
    }
}
